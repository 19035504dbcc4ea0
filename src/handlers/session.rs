use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::auth::session::{clear_cookie, cookie_value, set_cookie};
use crate::auth::{CSRF_COOKIE, SESSION_COOKIE};
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResult};
use crate::state::AppState;
use crate::validation::{FieldRule, Mode, Validator};

const CREDENTIAL: FieldRule = FieldRule::required();

/// POST /api-auth/login/ - Start a cookie session
pub async fn login(State(state): State<AppState>, ApiJson(body): ApiJson<Value>) -> ApiResult<Response> {
    let mut v = Validator::new(&body, Mode::Full)?;
    let username = v.string("username", &CREDENTIAL);
    let password = v.string("password", &CREDENTIAL);
    v.finish()?;
    let (Some(username), Some(password)) = (username.value(), password.value()) else {
        return Err(ApiError::internal("validated credentials are missing"));
    };

    let user = state.tokens.authenticate(&username, &password).await?;
    let issued = state.sessions.create_session(&user).await?;
    let max_age = state.sessions.ttl_secs();

    let mut response = Json(json!({ "detail": format!("Logged in as {}.", user.username) })).into_response();
    append_cookie(&mut response, &set_cookie(SESSION_COOKIE, &issued.key, max_age, true))?;
    append_cookie(&mut response, &set_cookie(CSRF_COOKIE, &issued.csrf_token, max_age, false))?;
    Ok(response)
}

/// POST /api-auth/logout/ - End the cookie session, if any
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    if let Some(key) = cookie_value(&headers, SESSION_COOKIE) {
        state.sessions.remove_session(key).await?;
    }
    let mut response = Json(json!({ "detail": "Logged out." })).into_response();
    append_cookie(&mut response, &clear_cookie(SESSION_COOKIE))?;
    append_cookie(&mut response, &clear_cookie(CSRF_COOKIE))?;
    Ok(response)
}

fn append_cookie(response: &mut Response, cookie: &str) -> ApiResult<()> {
    let value = HeaderValue::from_str(cookie).map_err(|e| ApiError::internal(format!("cookie header: {}", e)))?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(())
}
