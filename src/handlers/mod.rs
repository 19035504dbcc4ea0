pub mod archers;
pub mod clubs;
pub mod session;
pub mod system;
pub mod token;
pub mod users;

use axum::http::{header, HeaderMap, Uri};
use url::Url;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::filter::absolute_url;
use crate::models::club::membership_field;
use crate::state::AppState;
use crate::store::Store;
use crate::validation::{invalid_pk, Validator};

/// Checks that `author` and every membership archer exist, reporting
/// failures on the validator alongside the field errors.
pub(crate) async fn check_references(
    store: &dyn Store,
    v: &mut Validator<'_>,
    author: Option<i64>,
    archers: &[Uuid],
) -> Result<(), ApiError> {
    if let Some(author) = author {
        if store.find_user(author).await?.is_none() {
            v.error("author", invalid_pk(author));
        }
    }
    if !archers.is_empty() {
        let missing = store.missing_archers(archers).await?;
        for (index, archer) in archers.iter().enumerate() {
            if missing.contains(archer) {
                v.error(&membership_field(index), invalid_pk(archer));
            }
        }
    }
    Ok(())
}

/// Absolute URL of the current request, for pagination links.
pub(crate) fn request_url(headers: &HeaderMap, uri: &Uri) -> Result<Url, ApiError> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    absolute_url(host, path_and_query).map_err(|e| ApiError::internal(format!("request url: {}", e)))
}

pub(crate) fn audit(state: &AppState, user: &AuthUser, action: &str, entity: &str, id: Uuid) {
    if state.config.security.enable_audit_logging {
        tracing::info!(target: "audit", user_id = user.user_id, action, entity, %id);
    }
}
