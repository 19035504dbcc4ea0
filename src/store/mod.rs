//! Persistence for users, archers, clubs, memberships, sessions and
//! revoked tokens.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::filter::{ListQuery, Slice};
use crate::models::{Archer, ArcherDraft, ArcherPatch, ClubDraft, ClubPatch, ClubView, NewUser, Session, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{field}: {message}")]
    UniqueViolation { field: String, message: String },

    #[error("{field}: {message}")]
    InvalidReference { field: String, message: String },

    #[error("{0}")]
    Protected(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn not_found(entity: &'static str) -> Self {
        StoreError::NotFound { entity }
    }

    pub fn unique(field: &str, message: impl Into<String>) -> Self {
        StoreError::UniqueViolation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_reference(field: &str, message: impl Into<String>) -> Self {
        StoreError::InvalidReference {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn archer_in_use() -> Self {
        StoreError::Protected("Cannot delete archer: it is still a member of one or more clubs.".to_string())
    }
}

pub const UNION_NUMBER_TAKEN: &str = "archer with this union number already exists.";
pub const SLUG_TAKEN: &str = "club with this slug already exists.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";

/// Everything the HTTP layer and the CLI need from persistence.
///
/// List queries apply the filter and requested order; archers otherwise come
/// back in insertion order and clubs by name.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn count_archers(&self, query: &ListQuery) -> Result<u64, StoreError>;
    async fn list_archers(&self, query: &ListQuery, slice: Option<Slice>) -> Result<Vec<Archer>, StoreError>;
    async fn get_archer(&self, id: Uuid) -> Result<Archer, StoreError>;
    /// The ids in `ids` that name no archer.
    async fn missing_archers(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError>;
    async fn create_archer(&self, draft: ArcherDraft) -> Result<Archer, StoreError>;
    async fn update_archer(&self, id: Uuid, patch: ArcherPatch) -> Result<Archer, StoreError>;
    /// Fails with [`StoreError::Protected`] while the archer has memberships.
    async fn delete_archer(&self, id: Uuid) -> Result<(), StoreError>;

    async fn list_clubs(&self, query: &ListQuery) -> Result<Vec<ClubView>, StoreError>;
    async fn get_club(&self, id: Uuid) -> Result<ClubView, StoreError>;
    /// Creates the club and its memberships atomically.
    async fn create_club(&self, draft: ClubDraft) -> Result<ClubView, StoreError>;
    /// A membership list in `patch` replaces the existing set atomically.
    async fn update_club(&self, id: Uuid, patch: ClubPatch) -> Result<ClubView, StoreError>;
    /// Also deletes the club's memberships.
    async fn delete_club(&self, id: Uuid) -> Result<(), StoreError>;

    async fn create_session(&self, session: Session) -> Result<(), StoreError>;
    async fn find_session(&self, key_digest: &str) -> Result<Option<Session>, StoreError>;
    async fn delete_session(&self, key_digest: &str) -> Result<(), StoreError>;

    /// Records a revoked token id. Returns `false` when it was already revoked.
    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<bool, StoreError>;
    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError>;
}
