use crate::cli::{connect, utils::output_success, OutputFormat};
use crate::config::AppConfig;

pub async fn migrate(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    connect(config).await?;
    output_success(&output_format, "Database migrations applied", None)
}
