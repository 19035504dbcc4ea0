use axum::extract::State;

use crate::middleware::{ApiJson, ApiResult, StaffUser};
use crate::models::UserView;
use crate::state::AppState;

/// GET /users/
pub async fn list(State(state): State<AppState>, _staff: StaffUser) -> ApiResult<ApiJson<Vec<UserView>>> {
    let users = state.store.list_users().await?;
    Ok(ApiJson(users.into_iter().map(UserView::from).collect()))
}
