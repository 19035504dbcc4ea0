use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, Method},
    middleware::Next,
    response::Response,
};

use crate::auth::{session::cookie_value, AuthUser, SessionService, CSRF_HEADER, SESSION_COOKIE};
use crate::error::ApiError;
use crate::state::AppState;

/// Resolves request credentials and attaches the [`AuthUser`] as a request
/// extension. Requests without credentials pass through anonymously.
///
/// A bearer token wins over a session cookie, and a bearer token that does
/// not verify fails the request even when a valid session is present.
pub async fn authenticate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();
    if let Some(user) = resolve(&state, &parts.method, &parts.headers).await? {
        parts.extensions.insert(user);
    }
    Ok(next.run(Request::from_parts(parts, body)).await)
}

async fn resolve(state: &AppState, method: &Method, headers: &HeaderMap) -> Result<Option<AuthUser>, ApiError> {
    if let Some(token) = bearer_token(headers)? {
        return match state.tokens.verify(token).await {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                tracing::warn!("bearer authentication failed: {}", e);
                Err(e.into())
            }
        };
    }

    let Some(key) = cookie_value(headers, SESSION_COOKIE) else {
        return Ok(None);
    };
    let Some((session, user)) = state.sessions.get_session(key).await? else {
        return Ok(None);
    };

    if !method.is_safe() {
        let presented = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
        if !SessionService::verify_csrf_token(&session, presented) {
            tracing::warn!(user_id = user.id, %method, "csrf check failed");
            return Err(ApiError::forbidden("CSRF Failed: CSRF token missing or incorrect."));
        }
    }

    Ok(Some(AuthUser::from(&user)))
}

/// The token of a `Bearer` authorization header. Other schemes are not ours
/// and are ignored.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header."))?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(Some(token)),
        (Some(scheme), None, _) if scheme.eq_ignore_ascii_case("bearer") => Err(ApiError::unauthorized(
            "Invalid Authorization header. No credentials provided.",
        )),
        (Some(scheme), Some(_), Some(_)) if scheme.eq_ignore_ascii_case("bearer") => Err(ApiError::unauthorized(
            "Invalid Authorization header. Credentials string should not contain spaces.",
        )),
        _ => Ok(None),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(ApiError::not_authenticated)
    }
}

/// An authenticated staff user. Anonymous requests get 401, everyone else 403.
#[derive(Debug, Clone)]
pub struct StaffUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            tracing::debug!(user_id = user.user_id, "staff permission required");
            return Err(ApiError::permission_denied());
        }
        Ok(StaffUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(authorization: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(authorization));
        headers
    }

    #[test]
    fn reads_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")).unwrap(), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer abc")).unwrap(), Some("abc"));
        assert_eq!(bearer_token(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn ignores_other_schemes() {
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")).unwrap(), None);
    }

    #[test]
    fn rejects_malformed_bearer_header() {
        assert!(bearer_token(&headers("Bearer")).is_err());
        assert!(bearer_token(&headers("Bearer a b")).is_err());
    }
}
