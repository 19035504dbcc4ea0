pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod seed;
pub mod state;
pub mod store;
pub mod validation;

pub use state::AppState;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, MethodRouter},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::SecurityConfig;
use crate::handlers::{archers, clubs, session, system, token, users};

/// The full HTTP application over `state`.
pub fn app(state: AppState) -> Router {
    // Credential exchange runs without request authentication.
    let credentials = [
        ("/api/token/", post(token::obtain)),
        ("/api/token/refresh/", post(token::refresh)),
        ("/api/token/verify/", post(token::verify)),
        ("/api/token/blacklist/", post(token::blacklist)),
        ("/api-auth/login/", post(session::login)),
    ]
    .into_iter()
    .fold(Router::new(), |router, (path, handler)| with_and_without_slash(router, path, handler));

    let router = Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health));

    let authenticated = [
        ("/api-auth/logout/", post(session::logout)),
        ("/archers/", get(archers::list).post(archers::create)),
        ("/archers/info/", get(archers::info)),
        (
            "/archers/:id/",
            get(archers::retrieve)
                .put(archers::update)
                .patch(archers::partial_update)
                .delete(archers::destroy),
        ),
        ("/clubs/", get(clubs::list).post(clubs::create)),
        (
            "/clubs/:id/",
            get(clubs::retrieve)
                .put(clubs::update)
                .patch(clubs::partial_update)
                .delete(clubs::destroy),
        ),
        ("/users/", get(users::list)),
    ]
    .into_iter()
    .fold(router, |router, (path, handler)| with_and_without_slash(router, path, handler))
    .fallback(system::not_found)
    .layer(from_fn_with_state(state.clone(), middleware::authenticate));

    credentials
        .merge(authenticated)
        .layer(cors_layer(&state.config.security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn with_and_without_slash(
    router: Router<AppState>,
    path: &str,
    handler: MethodRouter<AppState>,
) -> Router<AppState> {
    router
        .route(path, handler.clone())
        .route(path.trim_end_matches('/'), handler)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(auth::CSRF_HEADER),
        ])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::store::MemoryStore;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router() -> Router {
        app(AppState::new(AppConfig::development(), Arc::new(MemoryStore::new())))
    }

    async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn routes_answer_with_and_without_trailing_slash() {
        assert_eq!(get("/archers/").await.0, StatusCode::OK);
        assert_eq!(get("/archers").await.0, StatusCode::OK);
        assert_eq!(get("/archers/info").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_routes_are_json_not_found() {
        let (status, body) = get("/nothing/here/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({ "detail": "Not found." }));
    }

    #[tokio::test]
    async fn clubs_reject_anonymous_requests() {
        let (status, body) = get("/clubs/").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Authentication credentials were not provided.");
    }
}
