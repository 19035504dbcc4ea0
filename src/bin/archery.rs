use clap::Parser;
use tracing_subscriber::EnvFilter;

use archery_api::cli::{utils::output_error, Cli, OutputFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("archery_api=warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_format = OutputFormat::from_cli(&cli);

    if let Err(e) = archery_api::cli::run(cli).await {
        let message = match std::env::var("CLI_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => format!("{e:?}"),
            _ => format!("{e:#}"),
        };
        output_error(&output_format, &message)?;
        std::process::exit(1);
    }

    Ok(())
}
