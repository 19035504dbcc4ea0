use clap::Args;
use serde_json::json;

use crate::cli::{open_store, utils::output_success, OutputFormat};
use crate::config::AppConfig;
use crate::seed::{self, UserSpec};

#[derive(Debug, Args)]
pub struct CreateUserArgs {
    #[arg(help = "Username")]
    pub username: String,

    #[arg(long, help = "Password (at least 8 characters, not all digits)")]
    pub password: String,

    #[arg(long, help = "Email address")]
    pub email: Option<String>,

    #[arg(long, help = "Grant staff access (archer writes, user list)")]
    pub staff: bool,

    #[arg(long, help = "Mark as superuser")]
    pub superuser: bool,
}

pub async fn create(config: &AppConfig, args: CreateUserArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let user = seed::create_user(
        &*store,
        config.auth.password_hash_cost,
        UserSpec {
            username: args.username,
            email: args.email,
            password: args.password,
            is_staff: args.staff || args.superuser,
            is_superuser: args.superuser,
        },
    )
    .await?;

    output_success(
        &output_format,
        &format!("Created user '{}'", user.username),
        Some(json!({
            "id": user.id,
            "username": user.username,
            "is_staff": user.is_staff,
            "is_superuser": user.is_superuser,
        })),
    )
}
