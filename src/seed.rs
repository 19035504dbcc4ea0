//! Account bootstrap and sample data, shared by the server and the CLI.

use thiserror::Error;

use crate::auth::{AuthError, PasswordService};
use crate::filter::ListQuery;
use crate::models::{ArcherDraft, ClubDraft, NewUser, User};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("{0}")]
    WeakPassword(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct UserSpec {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl UserSpec {
    pub fn admin(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: None,
            password: password.into(),
            is_staff: true,
            is_superuser: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PopulateSummary {
    pub admin: User,
    pub archers_created: usize,
    pub clubs_created: usize,
}

pub async fn create_user(store: &dyn Store, hash_cost: u32, account: UserSpec) -> Result<User, SeedError> {
    PasswordService::validate_password_strength(&account.password).map_err(SeedError::WeakPassword)?;
    let password_hash = PasswordService::hash_password_async(account.password, hash_cost).await?;
    let user = store
        .create_user(NewUser {
            username: account.username,
            email: account.email,
            password_hash,
            is_staff: account.is_staff,
            is_superuser: account.is_superuser,
        })
        .await?;
    tracing::info!(user_id = user.id, username = %user.username, staff = user.is_staff, "created user");
    Ok(user)
}

/// The existing user named in `account`, created when missing. An existing
/// account keeps its password and roles.
pub async fn ensure_user(store: &dyn Store, hash_cost: u32, account: UserSpec) -> Result<User, SeedError> {
    match store.find_user_by_username(&account.username).await? {
        Some(user) => Ok(user),
        None => create_user(store, hash_cost, account).await,
    }
}

const SAMPLE_ARCHERS: &[(&str, &str, Option<&str>, Option<i64>, Option<&str>)] = &[
    ("Smulders", "Harrie", None, Some(100_101), Some("Recurve, right handed")),
    ("Jansen", "Piet", None, Some(100_102), None),
    ("Berg", "Anna", Some("vd"), Some(100_103), Some("Compound")),
    ("Vermeulen", "Sanne", None, None, Some("Barebow, left handed")),
];

// Club name, town and indexes into SAMPLE_ARCHERS.
const SAMPLE_CLUBS: &[(&str, Option<&str>, &[usize])] = &[
    ("De Pijl", Some("Tilburg"), &[0, 1]),
    ("Sint Sebastiaan", Some("Eindhoven"), &[2, 3]),
    ("Willem Tell", None, &[]),
];

/// Ensures the admin account, then adds sample archers, clubs and
/// memberships when the store holds no archers yet.
pub async fn populate(store: &dyn Store, hash_cost: u32, admin: UserSpec) -> Result<PopulateSummary, SeedError> {
    let admin = ensure_user(store, hash_cost, admin).await?;

    if store.count_archers(&ListQuery::default()).await? > 0 {
        tracing::info!("archers already present, skipping sample data");
        return Ok(PopulateSummary {
            admin,
            archers_created: 0,
            clubs_created: 0,
        });
    }

    let mut archer_ids = Vec::with_capacity(SAMPLE_ARCHERS.len());
    for (last_name, first_name, middle_name, union_number, info) in SAMPLE_ARCHERS {
        let archer = store
            .create_archer(ArcherDraft {
                last_name: last_name.to_string(),
                first_name: first_name.to_string(),
                middle_name: middle_name.map(str::to_string),
                union_number: *union_number,
                info: info.map(str::to_string),
                author: admin.id,
            })
            .await?;
        archer_ids.push(archer.id);
    }

    for (name, town, members) in SAMPLE_CLUBS {
        store
            .create_club(ClubDraft {
                name: name.to_string(),
                slug: None,
                town: town.map(str::to_string),
                info: None,
                author: admin.id,
                memberships: members.iter().map(|i| archer_ids[*i]).collect(),
            })
            .await?;
    }

    tracing::info!(archers = archer_ids.len(), clubs = SAMPLE_CLUBS.len(), "populated sample data");
    Ok(PopulateSummary {
        admin,
        archers_created: archer_ids.len(),
        clubs_created: SAMPLE_CLUBS.len(),
    })
}
