use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use crate::{
    auth::{token, Password},
    error::StoreError,
    store::{
        tx::TxBackend,
        users::{User, UserTables},
    },
};

/// Unique constraint names from the `users` migration.
const USERS_EMAIL_KEY: &str = "users_email_key";
const USERS_USERNAME_KEY: &str = "users_username_key";

/// Translates a driver error into the store taxonomy using the structured
/// error kind and constraint name, never the message text.
pub(crate) fn classify(err: sqlx::Error) -> StoreError {
    let known = match &err {
        sqlx::Error::RowNotFound => Some(StoreError::NotFound),
        sqlx::Error::PoolTimedOut => Some(StoreError::Timeout),
        sqlx::Error::Database(db) if db.is_unique_violation() => match db.constraint() {
            Some(USERS_EMAIL_KEY) => Some(StoreError::DuplicateEmail),
            Some(USERS_USERNAME_KEY) => Some(StoreError::DuplicateUsername),
            _ => None,
        },
        // a referenced user or post is gone
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => Some(StoreError::NotFound),
        _ => None,
    };
    known.unwrap_or_else(|| StoreError::storage(err))
}

/// User row as stored.
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    created_at: OffsetDateTime,
    is_active: bool,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            username: r.username,
            email: r.email,
            password: Password::from_hash(r.password_hash),
            created_at: r.created_at,
            is_active: r.is_active,
        }
    }
}

/// A user joined through one of its invitations.
#[derive(Debug, FromRow)]
struct InvitedUserRow {
    #[sqlx(flatten)]
    user: UserRow,
    expiry: OffsetDateTime,
}

/// An expired invitation is indistinguishable from a missing one.
fn live_user(row: Option<InvitedUserRow>, now: OffsetDateTime) -> Result<User, StoreError> {
    match row {
        Some(row) if !token::is_expired(row.expiry, now) => Ok(row.user.into()),
        _ => Err(StoreError::NotFound),
    }
}

#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TxBackend for PgBackend {
    /// Rolls back when dropped uncommitted.
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        self.pool.begin().await.map_err(classify)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError> {
        tx.commit().await.map_err(classify)
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError> {
        tx.rollback().await.map_err(classify)
    }
}

#[async_trait]
impl UserTables for PgBackend {
    async fn insert_user(
        &self,
        tx: &mut Self::Tx,
        user: &User,
    ) -> Result<(i64, OffsetDateTime), StoreError> {
        let hash = user
            .password
            .hash()
            .ok_or_else(|| StoreError::Hashing("password credential is not set".into()))?;
        sqlx::query_as::<_, (i64, OffsetDateTime)>(
            r#"
            INSERT INTO users (username, email, password_hash, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(hash)
        .bind(user.is_active)
        .fetch_one(&mut **tx)
        .await
        .map_err(classify)
    }

    async fn insert_invitation(
        &self,
        tx: &mut Self::Tx,
        token_digest: &str,
        user_id: i64,
        expiry: OffsetDateTime,
    ) -> Result<(), StoreError> {
        // one live invitation per user: a new one supersedes the old
        sqlx::query("DELETE FROM user_invitations WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await
            .map_err(classify)?;

        sqlx::query(
            r#"
            INSERT INTO user_invitations (token_digest, user_id, expiry)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token_digest)
        .bind(user_id)
        .bind(expiry)
        .execute(&mut **tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn user_by_invitation(
        &self,
        tx: &mut Self::Tx,
        token_digest: &str,
        now: OffsetDateTime,
    ) -> Result<User, StoreError> {
        // FOR UPDATE makes a concurrent activation wait, then miss the deleted row
        let row = sqlx::query_as::<_, InvitedUserRow>(
            r#"
            SELECT u.id, u.username, u.email, u.password_hash, u.created_at, u.is_active,
                   ui.expiry
            FROM users u
            JOIN user_invitations ui ON ui.user_id = u.id
            WHERE ui.token_digest = $1
            FOR UPDATE OF ui
            "#,
        )
        .bind(token_digest)
        .fetch_optional(&mut **tx)
        .await
        .map_err(classify)?;
        live_user(row, now)
    }

    async fn update_user(&self, tx: &mut Self::Tx, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $1, email = $2, is_active = $3
            WHERE id = $4
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.is_active)
        .bind(user.id)
        .execute(&mut **tx)
        .await
        .map_err(classify)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, tx: &mut Self::Tx, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(classify)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_invitations(&self, tx: &mut Self::Tx, user_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM user_invitations WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn find_user(&self, id: i64) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, password_hash, created_at, is_active
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.into())
    }
}

/// Pool on `DATABASE_URL` with migrations applied. For ignored tests only.
#[cfg(test)]
pub(crate) async fn test_pool() -> PgPool {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&url).await.expect("connect to DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("apply migrations");
    pool
}
