use std::sync::Arc;

use crate::auth::{SessionService, TokenIssuer};
use crate::config::AppConfig;
use crate::store::Store;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub tokens: TokenIssuer,
    pub sessions: SessionService,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Self {
        Self {
            tokens: TokenIssuer::new(&config.auth, store.clone()),
            sessions: SessionService::new(&config.auth, store.clone()),
            config: Arc::new(config),
            store,
        }
    }
}
