pub mod password;
pub mod session;

pub use password::PasswordService;
pub use session::{SessionService, CSRF_COOKIE, CSRF_HEADER, SESSION_COOKIE};

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::User;
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No active account found with the given credentials")]
    InvalidCredentials,

    #[error("Token is invalid or expired")]
    InvalidToken,

    #[error("Token has wrong type")]
    WrongTokenType,

    #[error("Token is blacklisted")]
    Revoked,

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hash(#[from] bcrypt::BcryptError),

    #[error("{0}")]
    Encoding(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub username: String,
    pub token_type: TokenKind,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user: &User, token_type: TokenKind, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id.to_string(),
            username: user.username.clone(),
            token_type,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }
}

/// Authenticated user context attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub is_staff: bool,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues, refreshes, verifies and revokes HS256 JWTs.
#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn Store>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    hash_cost: u32,
    // Compared against when the username is unknown, so both failures take
    // the same time.
    dummy_hash: Arc<OnceCell<String>>,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig, store: Arc<dyn Store>) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            store,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: seconds(config.access_ttl_secs),
            refresh_ttl: seconds(config.refresh_ttl_secs),
            hash_cost: config.password_hash_cost,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Checks a username/password pair. Unknown users and wrong passwords
    /// fail identically.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = self.store.find_user_by_username(username).await?;
        let hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.dummy_hash().await?,
        };

        let matches = PasswordService::verify_password_async(password.to_string(), hash)
            .await
            .unwrap_or(false);
        match user {
            Some(user) if matches => Ok(user),
            _ => {
                tracing::warn!(username, "rejected credentials");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    pub async fn issue(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = self.authenticate(username, password).await?;
        let pair = self.issue_for(&user)?;
        tracing::info!(user_id = user.id, "issued token pair");
        Ok(pair)
    }

    pub fn issue_for(&self, user: &User) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access: self.encode(&Claims::new(user, TokenKind::Access, self.access_ttl))?,
            refresh: self.encode(&Claims::new(user, TokenKind::Refresh, self.refresh_ttl))?,
        })
    }

    /// New access token for a valid, unrevoked refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.decode_kind(refresh_token, TokenKind::Refresh)?;
        if self.store.is_token_revoked(claims.jti).await? {
            tracing::warn!(jti = %claims.jti, "refresh with revoked token");
            return Err(AuthError::Revoked);
        }
        let user = self.load_user(&claims).await?;
        self.encode(&Claims::new(&user, TokenKind::Access, self.access_ttl))
    }

    /// Resolves an access token to the user it was issued for. The user is
    /// re-read, so deleted accounts and role changes take effect at once.
    pub async fn verify(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.decode_kind(access_token, TokenKind::Access)?;
        let user = self.load_user(&claims).await?;
        Ok(AuthUser::from(&user))
    }

    /// Checks signature and expiry of either kind of token. A revoked
    /// refresh token does not verify.
    pub async fn verify_any(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.decode(token)?;
        if claims.token_type == TokenKind::Refresh && self.store.is_token_revoked(claims.jti).await? {
            return Err(AuthError::Revoked);
        }
        Ok(claims)
    }

    /// Revokes a refresh token. Revoking it again fails.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.decode_kind(refresh_token, TokenKind::Refresh)?;
        if !self.store.revoke_token(claims.jti, claims.expires_at()).await? {
            return Err(AuthError::Revoked);
        }
        tracing::info!(jti = %claims.jti, "revoked refresh token");
        Ok(())
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("rejected token: {}", e);
                AuthError::InvalidToken
            })
    }

    fn decode_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let claims = self.decode(token)?;
        if claims.token_type != kind {
            return Err(AuthError::WrongTokenType);
        }
        Ok(claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Encoding(format!("JWT generation error: {}", e)))
    }

    async fn load_user(&self, claims: &Claims) -> Result<User, AuthError> {
        self.store
            .find_user(claims.user_id()?)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn dummy_hash(&self) -> Result<String, AuthError> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash.clone());
        }
        let hash = PasswordService::hash_password_async("dummy-password-for-timing".into(), self.hash_cost).await?;
        Ok(self.dummy_hash.get_or_init(|| hash).clone())
    }
}

// Lifetimes are capped at a century.
fn seconds(secs: u64) -> Duration {
    const MAX_SECS: i64 = 100 * 365 * 24 * 60 * 60;
    Duration::seconds(i64::try_from(secs).unwrap_or(MAX_SECS).min(MAX_SECS))
}
