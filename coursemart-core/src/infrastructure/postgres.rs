use std::fmt;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;
use uuid::Uuid;

use crate::domain::users::auth::store::{
    CredentialStore, RotationOutcome, StoreError, StoreResult,
};
use crate::domain::users::identity::{CourseId, UserId, UserIdentity};

#[derive(Debug, Clone)]
pub struct PostgresStoreOptions {
    pub max_connections: u32,
    /// Upper bound on waiting for a pooled connection. Every store call fails
    /// with [`StoreError::Unavailable`] once this elapses.
    pub acquire_timeout: Duration,
}

impl Default for PostgresStoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    password_hash: String,
    refresh_tokens: Vec<String>,
    enrolled_courses: Vec<Uuid>,
    is_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for UserIdentity {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from(row.id),
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            refresh_tokens: row.refresh_tokens,
            enrolled_courses: row.enrolled_courses.into_iter().map(CourseId::from).collect(),
            is_admin: row.is_admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login_at: row.last_login_at,
        }
    }
}

const USER_COLUMNS: &str = "id, email, username, password_hash, refresh_tokens, \
     enrolled_courses, is_admin, created_at, updated_at, last_login_at";

/// Credential store backed by the `users` table.
///
/// Refresh-token mutations are single `UPDATE` statements on one row, so
/// concurrent rotations of the same token serialize on the row lock and only
/// the first one matches its `WHERE` clause.
pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl fmt::Debug for PostgresCredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresCredentialStore")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open the pool once and bring the schema up to date.
    pub async fn connect(url: &str, options: PostgresStoreOptions) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(url)
            .await
            .context("failed to connect to postgres")?;

        crate::MIGRATOR
            .run(&pool)
            .await
            .context("failed to run credential store migrations")?;
        info!(
            max_connections = options.max_connections,
            "postgres credential store ready"
        );

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        bind: &str,
    ) -> StoreResult<Option<UserIdentity>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(bind)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(UserIdentity::from))
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some("users_email_key") => "email",
                Some("users_username_key") => "username",
                _ => "id",
            };
            return StoreError::Conflict { field };
        }
    }
    StoreError::Unavailable(anyhow::Error::new(err).context("postgres credential store"))
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> StoreResult<Option<UserIdentity>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR username = $2 LIMIT 1"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(UserIdentity::from))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserIdentity>> {
        self.fetch_one_where("email = $1", email).await
    }

    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserIdentity>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(UserIdentity::from))
    }

    async fn create(&self, identity: UserIdentity) -> StoreResult<UserIdentity> {
        let enrolled: Vec<Uuid> = identity
            .enrolled_courses
            .iter()
            .map(CourseId::as_uuid)
            .collect();

        sqlx::query(
            r#"
            INSERT INTO users (
                id,
                email,
                username,
                password_hash,
                refresh_tokens,
                enrolled_courses,
                is_admin,
                created_at,
                updated_at,
                last_login_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(identity.id.as_uuid())
        .bind(&identity.email)
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .bind(&identity.refresh_tokens)
        .bind(&enrolled)
        .bind(identity.is_admin)
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .bind(identity.last_login_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(identity)
    }

    async fn rotate_refresh_token(
        &self,
        id: UserId,
        old: &str,
        new: &str,
    ) -> StoreResult<RotationOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_tokens = array_append(array_remove(refresh_tokens, $2), $3),
                updated_at = NOW()
            WHERE id = $1
              AND $2 = ANY(refresh_tokens)
            "#,
        )
        .bind(id.as_uuid())
        .bind(old)
        .bind(new)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 1 {
            return Ok(RotationOutcome::Rotated);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(if exists {
            RotationOutcome::TokenNotPresent
        } else {
            RotationOutcome::IdentityMissing
        })
    }

    async fn push_refresh_token(
        &self,
        id: UserId,
        token: &str,
        evict: &[String],
        max_held: usize,
    ) -> StoreResult<bool> {
        let keep = i64::try_from(max_held.saturating_sub(1)).unwrap_or(i64::MAX);

        // Keeps the newest `$4` survivors in their original order.
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_tokens = array_append(
                    ARRAY(
                        SELECT held
                        FROM (
                            SELECT held, position
                            FROM unnest(refresh_tokens) WITH ORDINALITY AS held_tokens(held, position)
                            WHERE NOT (held = ANY($3::text[]))
                            ORDER BY position DESC
                            LIMIT $4
                        ) AS kept
                        ORDER BY position
                    ),
                    $2
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(token)
        .bind(evict)
        .bind(keep)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove_refresh_token(&self, id: UserId, token: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_tokens = array_remove(refresh_tokens, $2),
                updated_at = NOW()
            WHERE id = $1
              AND $2 = ANY(refresh_tokens)
            "#,
        )
        .bind(id.as_uuid())
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET last_login_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn save(&self, identity: &UserIdentity) -> StoreResult<()> {
        let enrolled: Vec<Uuid> = identity
            .enrolled_courses
            .iter()
            .map(CourseId::as_uuid)
            .collect();

        sqlx::query(
            r#"
            UPDATE users
            SET enrolled_courses = $2,
                is_admin = $3,
                last_login_at = $4,
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(identity.id.as_uuid())
        .bind(&enrolled)
        .bind(identity.is_admin)
        .bind(identity.last_login_at)
        .bind(identity.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
