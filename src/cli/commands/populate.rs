use clap::Args;
use serde_json::json;

use crate::cli::{open_store, utils::output_success, OutputFormat};
use crate::config::AppConfig;
use crate::seed::{self, UserSpec};

#[derive(Debug, Args)]
pub struct PopulateArgs {
    #[arg(long, default_value = "admin", help = "Admin username")]
    pub admin_username: String,

    #[arg(long, help = "Admin password, used only when the admin account is created")]
    pub admin_password: String,
}

pub async fn run(config: &AppConfig, args: PopulateArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let summary = seed::populate(
        &*store,
        config.auth.password_hash_cost,
        UserSpec::admin(args.admin_username, args.admin_password),
    )
    .await?;

    output_success(
        &output_format,
        &format!(
            "Populated {} archers and {} clubs (admin '{}')",
            summary.archers_created, summary.clubs_created, summary.admin.username
        ),
        Some(json!({
            "admin": summary.admin.username,
            "archers_created": summary.archers_created,
            "clubs_created": summary.clubs_created,
        })),
    )
}
