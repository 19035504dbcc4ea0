use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use archery_api::config::AppConfig;
use archery_api::seed::{self, UserSpec};
use archery_api::store::{MemoryStore, PgStore, Store};
use archery_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("archery_api=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting Archery API in {:?} mode", config.environment);

    let store: Arc<dyn Store> = match &config.database.url {
        Some(url) => {
            let store = PgStore::connect(url, &config.database)
                .await
                .context("failed to connect to database")?;
            store.migrate().await.context("failed to run migrations")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, using the in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    if let (Ok(username), Ok(password)) = (std::env::var("ADMIN_USERNAME"), std::env::var("ADMIN_PASSWORD")) {
        let admin = seed::ensure_user(&*store, config.auth.password_hash_cost, UserSpec::admin(username, password))
            .await
            .context("failed to bootstrap admin user")?;
        tracing::info!(username = %admin.username, "admin user ready");
    }

    let bind_addr = config.bind_address();
    let app = app(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Archery API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
