use axum::extract::State;
use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::TokenPair;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResult};
use crate::state::AppState;
use crate::validation::{FieldRule, Mode, Validator};

const CREDENTIAL: FieldRule = FieldRule::required();
const TOKEN: FieldRule = FieldRule::required();

#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access: String,
}

/// POST /api/token/ - Exchange credentials for an access/refresh pair
pub async fn obtain(State(state): State<AppState>, ApiJson(body): ApiJson<Value>) -> ApiResult<ApiJson<TokenPair>> {
    let mut v = Validator::new(&body, Mode::Full)?;
    let username = v.string("username", &CREDENTIAL);
    let password = v.string("password", &CREDENTIAL);
    v.finish()?;

    let (Some(username), Some(password)) = (username.value(), password.value()) else {
        return Err(ApiError::internal("validated credentials are missing"));
    };
    Ok(ApiJson(state.tokens.issue(&username, &password).await?))
}

/// POST /api/token/refresh/
pub async fn refresh(State(state): State<AppState>, ApiJson(body): ApiJson<Value>) -> ApiResult<ApiJson<AccessToken>> {
    let token = required_token(&body, "refresh")?;
    let access = state.tokens.refresh(&token).await?;
    Ok(ApiJson(AccessToken { access }))
}

/// POST /api/token/verify/ - Any valid token kind verifies
pub async fn verify(State(state): State<AppState>, ApiJson(body): ApiJson<Value>) -> ApiResult<ApiJson<Value>> {
    let token = required_token(&body, "token")?;
    state.tokens.verify_any(&token).await?;
    Ok(ApiJson(json!({})))
}

/// POST /api/token/blacklist/ - Revoke a refresh token
pub async fn blacklist(State(state): State<AppState>, ApiJson(body): ApiJson<Value>) -> ApiResult<ApiJson<Value>> {
    let token = required_token(&body, "refresh")?;
    state.tokens.revoke(&token).await?;
    Ok(ApiJson(json!({})))
}

fn required_token(body: &Value, name: &str) -> ApiResult<String> {
    let mut v = Validator::new(body, Mode::Full)?;
    let token = v.string(name, &TOKEN);
    v.finish()?;
    token
        .value()
        .ok_or_else(|| ApiError::internal("validated token is missing"))
}
