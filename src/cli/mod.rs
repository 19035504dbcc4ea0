pub mod commands;
pub mod utils;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::store::{PgStore, Store};

#[derive(Parser)]
#[command(name = "archery")]
#[command(about = "Archery CLI - Management commands for the Archery API database")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Create a user account")]
    CreateUser(commands::user::CreateUserArgs),

    #[command(about = "Create the admin account and sample archers, clubs and memberships")]
    Populate(commands::populate::PopulateArgs),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = AppConfig::from_env();

    match cli.command {
        Commands::Migrate => commands::database::migrate(&config, output_format).await,
        Commands::CreateUser(args) => commands::user::create(&config, args, output_format).await,
        Commands::Populate(args) => commands::populate::run(&config, args, output_format).await,
    }
}

/// Connects to the configured database with migrations applied.
pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<PgStore> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL must be set")?;
    let store = PgStore::connect(url, &config.database)
        .await
        .context("failed to connect to database")?;
    store.migrate().await.context("failed to run migrations")?;
    Ok(store)
}

pub(crate) async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    Ok(Arc::new(connect(config).await?))
}
