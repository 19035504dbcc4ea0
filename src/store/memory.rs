use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, SLUG_TAKEN, UNION_NUMBER_TAKEN, USERNAME_TAKEN};
use crate::filter::{ListQuery, Slice};
use crate::models::club::{slugify, unique_slug};
use crate::models::{
    Archer, ArcherDraft, ArcherPatch, Club, ClubDraft, ClubPatch, ClubView, Membership, MembershipView, NewUser,
    Session, User,
};
use crate::validation::invalid_pk;

#[derive(Default)]
struct Tables {
    next_user_id: i64,
    users: Vec<User>,
    // Vectors keep insertion order.
    archers: Vec<Archer>,
    clubs: Vec<Club>,
    memberships: Vec<Membership>,
    sessions: HashMap<String, Session>,
    revoked: HashMap<Uuid, DateTime<Utc>>,
}

impl Tables {
    fn user_exists(&self, id: i64) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    fn archer(&self, id: Uuid) -> Option<&Archer> {
        self.archers.iter().find(|a| a.id == id)
    }

    fn check_author(&self, author: i64) -> Result<(), StoreError> {
        if self.user_exists(author) {
            Ok(())
        } else {
            Err(StoreError::invalid_reference("author", invalid_pk(author)))
        }
    }

    fn check_union_number(&self, union_number: Option<i64>, except: Option<Uuid>) -> Result<(), StoreError> {
        let Some(number) = union_number else {
            return Ok(());
        };
        let taken = self
            .archers
            .iter()
            .any(|a| a.union_number == Some(number) && Some(a.id) != except);
        if taken {
            Err(StoreError::unique("union_number", UNION_NUMBER_TAKEN))
        } else {
            Ok(())
        }
    }

    fn check_members(&self, archers: &[Uuid]) -> Result<(), StoreError> {
        match archers.iter().find(|id| self.archer(**id).is_none()) {
            Some(missing) => Err(StoreError::invalid_reference("memberships", invalid_pk(missing))),
            None => Ok(()),
        }
    }

    fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> bool {
        self.clubs.iter().any(|c| c.slug == slug && Some(c.id) != except)
    }

    fn replace_memberships(&mut self, club_id: Uuid, archers: &[Uuid]) {
        self.memberships.retain(|m| m.club_id != club_id);
        self.memberships
            .extend(archers.iter().map(|archer_id| Membership::new(club_id, *archer_id)));
    }

    fn view(&self, club: &Club) -> ClubView {
        let memberships = self
            .memberships
            .iter()
            .filter(|m| m.club_id == club.id)
            .map(|m| MembershipView {
                id: m.id,
                created_at: m.created_at,
                modified_at: m.modified_at,
                archer: self.archer(m.archer_id).map(Archer::display_name).unwrap_or_default(),
            })
            .collect();
        ClubView {
            club: club.clone(),
            memberships,
        }
    }
}

/// Store kept entirely in process memory. Used by the test suite and by
/// servers started without `DATABASE_URL`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::unique("username", USERNAME_TAKEN));
        }
        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            created_at: crate::models::timestamp_now(),
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.clone())
    }

    async fn count_archers(&self, query: &ListQuery) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.archers.iter().filter(|a| query.matches(*a)).count() as u64)
    }

    async fn list_archers(&self, query: &ListQuery, slice: Option<Slice>) -> Result<Vec<Archer>, StoreError> {
        let tables = self.tables.read().await;
        let mut archers: Vec<Archer> = tables.archers.iter().filter(|a| query.matches(*a)).cloned().collect();
        query.sort(&mut archers);
        Ok(match slice {
            Some(slice) => archers
                .into_iter()
                .skip(slice.offset as usize)
                .take(slice.limit as usize)
                .collect(),
            None => archers,
        })
    }

    async fn get_archer(&self, id: Uuid) -> Result<Archer, StoreError> {
        let tables = self.tables.read().await;
        tables.archer(id).cloned().ok_or(StoreError::not_found("archer"))
    }

    async fn missing_archers(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter(|id| tables.archer(**id).is_none()).copied().collect())
    }

    async fn create_archer(&self, draft: ArcherDraft) -> Result<Archer, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_author(draft.author)?;
        tables.check_union_number(draft.union_number, None)?;
        let archer = Archer::new(draft);
        tables.archers.push(archer.clone());
        Ok(archer)
    }

    async fn update_archer(&self, id: Uuid, patch: ArcherPatch) -> Result<Archer, StoreError> {
        let mut tables = self.tables.write().await;
        let index = tables
            .archers
            .iter()
            .position(|a| a.id == id)
            .ok_or(StoreError::not_found("archer"))?;
        if let Some(author) = patch.author {
            tables.check_author(author)?;
        }
        if let Some(union_number) = patch.union_number {
            tables.check_union_number(union_number, Some(id))?;
        }
        let archer = &mut tables.archers[index];
        archer.apply(patch);
        Ok(archer.clone())
    }

    async fn delete_archer(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let index = tables
            .archers
            .iter()
            .position(|a| a.id == id)
            .ok_or(StoreError::not_found("archer"))?;
        if tables.memberships.iter().any(|m| m.archer_id == id) {
            return Err(StoreError::archer_in_use());
        }
        tables.archers.remove(index);
        Ok(())
    }

    async fn list_clubs(&self, query: &ListQuery) -> Result<Vec<ClubView>, StoreError> {
        let tables = self.tables.read().await;
        let mut clubs: Vec<Club> = tables.clubs.iter().filter(|c| query.matches(*c)).cloned().collect();
        // Stable, so equal names keep insertion order.
        clubs.sort_by_cached_key(|c| c.name.to_lowercase());
        query.sort(&mut clubs);
        Ok(clubs.iter().map(|c| tables.view(c)).collect())
    }

    async fn get_club(&self, id: Uuid) -> Result<ClubView, StoreError> {
        let tables = self.tables.read().await;
        tables
            .clubs
            .iter()
            .find(|c| c.id == id)
            .map(|c| tables.view(c))
            .ok_or(StoreError::not_found("club"))
    }

    async fn create_club(&self, draft: ClubDraft) -> Result<ClubView, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_author(draft.author)?;
        tables.check_members(&draft.memberships)?;

        let slug = match &draft.slug {
            Some(slug) if tables.slug_taken(slug, None) => return Err(StoreError::unique("slug", SLUG_TAKEN)),
            Some(slug) => slug.clone(),
            None => unique_slug(&slugify(&draft.name), |s| tables.slug_taken(s, None)),
        };

        let club = Club::new(&draft, slug);
        tables.replace_memberships(club.id, &draft.memberships);
        tables.clubs.push(club.clone());
        Ok(tables.view(&club))
    }

    async fn update_club(&self, id: Uuid, patch: ClubPatch) -> Result<ClubView, StoreError> {
        let mut tables = self.tables.write().await;
        let index = tables
            .clubs
            .iter()
            .position(|c| c.id == id)
            .ok_or(StoreError::not_found("club"))?;
        if let Some(author) = patch.author {
            tables.check_author(author)?;
        }
        if let Some(slug) = &patch.slug {
            if tables.slug_taken(slug, Some(id)) {
                return Err(StoreError::unique("slug", SLUG_TAKEN));
            }
        }
        if let Some(members) = &patch.memberships {
            tables.check_members(members)?;
        }

        tables.clubs[index].apply(&patch);
        if let Some(members) = &patch.memberships {
            tables.replace_memberships(id, members);
        }
        let club = tables.clubs[index].clone();
        Ok(tables.view(&club))
    }

    async fn delete_club(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let index = tables
            .clubs
            .iter()
            .position(|c| c.id == id)
            .ok_or(StoreError::not_found("club"))?;
        tables.clubs.remove(index);
        tables.memberships.retain(|m| m.club_id != id);
        Ok(())
    }

    async fn create_session(&self, session: Session) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.sessions.retain(|_, s| !s.is_expired());
        tables.sessions.insert(session.key_digest.clone(), session);
        Ok(())
    }

    async fn find_session(&self, key_digest: &str) -> Result<Option<Session>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.sessions.get(key_digest).cloned())
    }

    async fn delete_session(&self, key_digest: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.sessions.remove(key_digest);
        Ok(())
    }

    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        tables.revoked.retain(|_, exp| *exp > now);
        Ok(tables.revoked.insert(jti, expires_at).is_none())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.revoked.contains_key(&jti))
    }
}
