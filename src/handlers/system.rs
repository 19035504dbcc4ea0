use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// GET / - Service description
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "Archery API",
        "version": version,
        "environment": state.config.environment,
        "endpoints": {
            "token": "/api/token/, /api/token/refresh/, /api/token/verify/, /api/token/blacklist/ (public)",
            "session": "/api-auth/login/, /api-auth/logout/ (public)",
            "archers": "/archers/[:id/] (read public, write staff)",
            "archer_info": "/archers/info/ (public)",
            "clubs": "/clubs/[:id/] (authenticated)",
            "users": "/users/ (staff)",
        }
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::error!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}

/// Any unrouted path.
pub async fn not_found() -> ApiError {
    ApiError::not_found()
}
