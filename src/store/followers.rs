use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use crate::{
    error::StoreError,
    store::{bounded, postgres::classify},
};

/// Directed follow edges. Both operations are idempotent.
#[async_trait]
pub trait Followers: Send + Sync {
    /// `NotFound` if either user does not exist.
    async fn follow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError>;
    async fn unfollow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgFollowerStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgFollowerStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl Followers for PgFollowerStore {
    async fn follow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        let result = bounded(self.timeout, async {
            sqlx::query(
                r#"
                INSERT INTO followers (follower_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(follower_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(classify)
        })
        .await?;
        debug!(follower_id, user_id, inserted = result.rows_affected(), "follow");
        Ok(())
    }

    async fn unfollow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        bounded(self.timeout, async {
            sqlx::query("DELETE FROM followers WHERE follower_id = $1 AND user_id = $2")
                .bind(follower_id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(classify)
        })
        .await?;
        Ok(())
    }
}
