use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::QueryAs;
use sqlx::{FromRow, PgPool, Postgres};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Store, StoreError, SLUG_TAKEN, UNION_NUMBER_TAKEN, USERNAME_TAKEN};
use crate::config::DatabaseConfig;
use crate::filter::{FilterValue, ListQuery, Slice, SqlResult};
use crate::models::archer::display_name;
use crate::models::club::{slugify, unique_slug};
use crate::models::{
    Archer, ArcherDraft, ArcherPatch, Club, ClubDraft, ClubPatch, ClubView, Membership, MembershipView, NewUser,
    Session, User,
};

const USER_COLUMNS: &str = "id, username, email, password_hash, is_staff, is_superuser, created_at";
const ARCHER_COLUMNS: &str =
    "id, created_at, modified_at, last_name, first_name, middle_name, union_number, info, author";
const CLUB_COLUMNS: &str = "id, created_at, modified_at, name, slug, town, info, author";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;
        info!("Connected to PostgreSQL (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    async fn memberships_for(&self, club_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<MembershipView>>, StoreError> {
        let mut by_club: HashMap<Uuid, Vec<MembershipView>> = HashMap::new();
        if club_ids.is_empty() {
            return Ok(by_club);
        }
        let rows: Vec<MembershipRow> = sqlx::query_as(
            "SELECT m.club_id, m.id, m.created_at, m.modified_at, a.last_name, a.first_name, a.middle_name \
             FROM membership m JOIN archer a ON a.id = m.archer_id \
             WHERE m.club_id = ANY($1) ORDER BY m.seq",
        )
        .bind(club_ids)
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            by_club.entry(row.club_id).or_default().push(MembershipView {
                id: row.id,
                created_at: row.created_at,
                modified_at: row.modified_at,
                archer: display_name(&row.last_name, &row.first_name, row.middle_name.as_deref()),
            });
        }
        Ok(by_club)
    }

    async fn club_views(&self, clubs: Vec<Club>) -> Result<Vec<ClubView>, StoreError> {
        let ids: Vec<Uuid> = clubs.iter().map(|c| c.id).collect();
        let mut memberships = self.memberships_for(&ids).await?;
        Ok(clubs
            .into_iter()
            .map(|club| ClubView {
                memberships: memberships.remove(&club.id).unwrap_or_default(),
                club,
            })
            .collect())
    }

    async fn derive_slug(&self, name: &str) -> Result<String, StoreError> {
        let base = slugify(name);
        let prefix: String = base.chars().take(40).collect();
        let taken: HashSet<String> = sqlx::query_scalar::<_, String>("SELECT slug FROM club WHERE slug LIKE $1")
            .bind(format!("{}%", prefix.replace('_', "\\_")))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .collect();
        Ok(unique_slug(&base, |s| taken.contains(s)))
    }
}

#[derive(FromRow)]
struct MembershipRow {
    club_id: Uuid,
    id: Uuid,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    last_name: String,
    first_name: String,
    middle_name: Option<String>,
}

/// Maps constraint violations to field-scoped errors.
fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        let code = db.code();
        match (code.as_deref(), db.constraint()) {
            (Some("23505"), Some("archer_union_number_key")) => {
                return StoreError::unique("union_number", UNION_NUMBER_TAKEN)
            }
            (Some("23505"), Some("club_slug_key")) => return StoreError::unique("slug", SLUG_TAKEN),
            (Some("23505"), Some("users_username_key")) => return StoreError::unique("username", USERNAME_TAKEN),
            (Some("23503"), Some("archer_author_fkey" | "club_author_fkey")) => {
                return StoreError::invalid_reference("author", "Invalid pk - object does not exist.")
            }
            (Some("23503"), Some("membership_archer_id_fkey")) => {
                return StoreError::invalid_reference("memberships", "Invalid pk - object does not exist.")
            }
            _ => {}
        }
    }
    StoreError::Sqlx(err)
}

fn bind_filter_value<'q, O>(
    q: QueryAs<'q, Postgres, O, PgArguments>,
    v: &'q FilterValue,
) -> QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    match v {
        FilterValue::Text(s) => q.bind(s),
        FilterValue::Date(d) => q.bind(*d),
        FilterValue::Timestamp(t) => q.bind(*t),
    }
}

fn limit_clause(slice: Option<Slice>) -> String {
    match slice {
        Some(s) => format!("LIMIT {} OFFSET {}", s.limit, s.offset),
        None => String::new(),
    }
}

async fn insert_memberships(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    club_id: Uuid,
    archers: &[Uuid],
) -> Result<(), StoreError> {
    for archer_id in archers {
        let m = Membership::new(club_id, *archer_id);
        sqlx::query(
            "INSERT INTO membership (id, created_at, modified_at, club_id, archer_id) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(m.id)
        .bind(m.created_at)
        .bind(m.modified_at)
        .bind(m.club_id)
        .bind(m.archer_id)
        .execute(&mut **tx)
        .await
        .map_err(map_db_error)?;
    }
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, is_staff, is_superuser) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.is_staff)
            .bind(user.is_superuser)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        Ok(sqlx::query_as(&sql).bind(username).fetch_optional(&self.pool).await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        Ok(sqlx::query_as(&sql).fetch_all(&self.pool).await?)
    }

    async fn count_archers(&self, query: &ListQuery) -> Result<u64, StoreError> {
        let SqlResult { query: where_clause, params } = query.to_where_sql();
        let sql = format!("SELECT COUNT(*) FROM archer WHERE {}", where_clause);
        debug!(%sql, "count archers");
        let mut q = sqlx::query_as::<_, (i64,)>(&sql);
        for p in params.iter() {
            q = bind_filter_value(q, p);
        }
        let (count,) = q.fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn list_archers(&self, query: &ListQuery, slice: Option<Slice>) -> Result<Vec<Archer>, StoreError> {
        let SqlResult { query: where_clause, params } = query.to_where_sql();
        let sql = format!(
            "SELECT {} FROM archer WHERE {} {} {}",
            ARCHER_COLUMNS,
            where_clause,
            query.to_order_sql(&["seq"]),
            limit_clause(slice)
        );
        debug!(%sql, "list archers");
        let mut q = sqlx::query_as::<_, Archer>(&sql);
        for p in params.iter() {
            q = bind_filter_value(q, p);
        }
        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn get_archer(&self, id: Uuid) -> Result<Archer, StoreError> {
        let sql = format!("SELECT {} FROM archer WHERE id = $1", ARCHER_COLUMNS);
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::not_found("archer"))
    }

    async fn missing_archers(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let found: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>("SELECT id FROM archer WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .collect();
        Ok(ids.iter().filter(|id| !found.contains(id)).copied().collect())
    }

    async fn create_archer(&self, draft: ArcherDraft) -> Result<Archer, StoreError> {
        let archer = Archer::new(draft);
        sqlx::query(
            "INSERT INTO archer (id, created_at, modified_at, last_name, first_name, middle_name, union_number, info, author) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(archer.id)
        .bind(archer.created_at)
        .bind(archer.modified_at)
        .bind(&archer.last_name)
        .bind(&archer.first_name)
        .bind(&archer.middle_name)
        .bind(archer.union_number)
        .bind(&archer.info)
        .bind(archer.author)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(archer)
    }

    async fn update_archer(&self, id: Uuid, patch: ArcherPatch) -> Result<Archer, StoreError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!("SELECT {} FROM archer WHERE id = $1 FOR UPDATE", ARCHER_COLUMNS);
        let mut archer: Archer = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::not_found("archer"))?;

        archer.apply(patch);
        sqlx::query(
            "UPDATE archer SET modified_at = $2, last_name = $3, first_name = $4, middle_name = $5, \
             union_number = $6, info = $7, author = $8 WHERE id = $1",
        )
        .bind(archer.id)
        .bind(archer.modified_at)
        .bind(&archer.last_name)
        .bind(&archer.first_name)
        .bind(&archer.middle_name)
        .bind(archer.union_number)
        .bind(&archer.info)
        .bind(archer.author)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;
        tx.commit().await?;
        Ok(archer)
    }

    async fn delete_archer(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM archer WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| match map_db_error(err) {
                StoreError::InvalidReference { .. } => StoreError::archer_in_use(),
                other => other,
            })?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("archer"));
        }
        Ok(())
    }

    async fn list_clubs(&self, query: &ListQuery) -> Result<Vec<ClubView>, StoreError> {
        let SqlResult { query: where_clause, params } = query.to_where_sql();
        let sql = format!(
            "SELECT {} FROM club WHERE {} ORDER BY lower(name) ASC, seq ASC",
            CLUB_COLUMNS, where_clause
        );
        debug!(%sql, "list clubs");
        let mut q = sqlx::query_as::<_, Club>(&sql);
        for p in params.iter() {
            q = bind_filter_value(q, p);
        }
        let clubs = q.fetch_all(&self.pool).await?;
        self.club_views(clubs).await
    }

    async fn get_club(&self, id: Uuid) -> Result<ClubView, StoreError> {
        let sql = format!("SELECT {} FROM club WHERE id = $1", CLUB_COLUMNS);
        let club: Club = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::not_found("club"))?;
        let mut views = self.club_views(vec![club]).await?;
        views.pop().ok_or(StoreError::not_found("club"))
    }

    async fn create_club(&self, draft: ClubDraft) -> Result<ClubView, StoreError> {
        let slug = match &draft.slug {
            Some(slug) => slug.clone(),
            None => self.derive_slug(&draft.name).await?,
        };
        let club = Club::new(&draft, slug);

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO club (id, created_at, modified_at, name, slug, town, info, author) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(club.id)
        .bind(club.created_at)
        .bind(club.modified_at)
        .bind(&club.name)
        .bind(&club.slug)
        .bind(&club.town)
        .bind(&club.info)
        .bind(club.author)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;
        insert_memberships(&mut tx, club.id, &draft.memberships).await?;
        tx.commit().await?;

        self.get_club(club.id).await
    }

    async fn update_club(&self, id: Uuid, patch: ClubPatch) -> Result<ClubView, StoreError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!("SELECT {} FROM club WHERE id = $1 FOR UPDATE", CLUB_COLUMNS);
        let mut club: Club = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::not_found("club"))?;

        club.apply(&patch);
        sqlx::query(
            "UPDATE club SET modified_at = $2, name = $3, slug = $4, town = $5, info = $6, author = $7 WHERE id = $1",
        )
        .bind(club.id)
        .bind(club.modified_at)
        .bind(&club.name)
        .bind(&club.slug)
        .bind(&club.town)
        .bind(&club.info)
        .bind(club.author)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if let Some(members) = &patch.memberships {
            sqlx::query("DELETE FROM membership WHERE club_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_memberships(&mut tx, id, members).await?;
        }
        tx.commit().await?;

        self.get_club(id).await
    }

    async fn delete_club(&self, id: Uuid) -> Result<(), StoreError> {
        // Memberships go with the club (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM club WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("club"));
        }
        Ok(())
    }

    async fn create_session(&self, session: Session) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM session WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        sqlx::query("INSERT INTO session (key_digest, user_id, csrf_token, expires_at) VALUES ($1, $2, $3, $4)")
            .bind(&session.key_digest)
            .bind(session.user_id)
            .bind(&session.csrf_token)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_session(&self, key_digest: &str) -> Result<Option<Session>, StoreError> {
        Ok(sqlx::query_as(
            "SELECT key_digest, user_id, csrf_token, expires_at FROM session WHERE key_digest = $1",
        )
        .bind(key_digest)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_session(&self, key_digest: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM session WHERE key_digest = $1")
            .bind(key_digest)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        sqlx::query("DELETE FROM revoked_token WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        let result = sqlx::query(
            "INSERT INTO revoked_token (jti, expires_at) VALUES ($1, $2) ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError> {
        let (revoked,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM revoked_token WHERE jti = $1)")
            .bind(jti)
            .fetch_one(&self.pool)
            .await?;
        Ok(revoked)
    }
}
