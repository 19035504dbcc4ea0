use std::sync::Arc;

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::AuthError;
use crate::config::AuthConfig;
use crate::models::{Session, User};
use crate::store::Store;

pub const SESSION_COOKIE: &str = "sessionid";
pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "x-csrftoken";

/// A freshly created session. `key` goes to the client and is never stored.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub key: String,
    pub csrf_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Cookie sessions persisted through the store, keyed by the SHA-256 of
/// the cookie value.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn Store>,
    ttl: Duration,
}

impl SessionService {
    pub fn new(config: &AuthConfig, store: Arc<dyn Store>) -> Self {
        let secs = i64::try_from(config.session_ttl_secs).unwrap_or(i64::MAX).min(10 * 365 * 24 * 60 * 60);
        Self {
            store,
            ttl: Duration::seconds(secs),
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub async fn create_session(&self, user: &User) -> Result<IssuedSession, AuthError> {
        let issued = IssuedSession {
            key: random_token(),
            csrf_token: random_token(),
            expires_at: Utc::now() + self.ttl,
        };
        self.store
            .create_session(Session {
                key_digest: digest(&issued.key),
                user_id: user.id,
                csrf_token: issued.csrf_token.clone(),
                expires_at: issued.expires_at,
            })
            .await?;
        tracing::info!(user_id = user.id, "session created");
        Ok(issued)
    }

    /// The live session for `key` and its user. Expired sessions are removed.
    pub async fn get_session(&self, key: &str) -> Result<Option<(Session, User)>, AuthError> {
        let key_digest = digest(key);
        let Some(session) = self.store.find_session(&key_digest).await? else {
            return Ok(None);
        };
        if session.is_expired() {
            self.store.delete_session(&key_digest).await?;
            return Ok(None);
        }
        let user = self.store.find_user(session.user_id).await?;
        Ok(user.map(|user| (session, user)))
    }

    pub async fn remove_session(&self, key: &str) -> Result<(), AuthError> {
        self.store.delete_session(&digest(key)).await?;
        Ok(())
    }

    pub fn verify_csrf_token(session: &Session, presented: Option<&str>) -> bool {
        presented.is_some_and(|token| constant_time_eq(token.as_bytes(), session.csrf_token.as_bytes()))
    }
}

pub fn digest(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

fn random_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Value of cookie `name` across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"'))
}

pub fn set_cookie(name: &str, value: &str, max_age_secs: i64, http_only: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; Max-Age={}; SameSite=Lax", name, value, max_age_secs);
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    cookie
}

pub fn clear_cookie(name: &str) -> String {
    format!("{}=\"\"; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT", name)
}
