use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::{
    error::StoreError,
    store::{bounded, postgres::classify},
};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Comment {
    pub fn new(post_id: i64, user_id: i64, content: String) -> Self {
        Self {
            id: 0,
            post_id,
            user_id,
            content,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }
}

#[async_trait]
pub trait Comments: Send + Sync {
    async fn create(&self, comment: &mut Comment) -> Result<(), StoreError>;
    /// Newest first.
    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Comment>, StoreError>;
}

#[derive(Clone)]
pub struct PgCommentStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgCommentStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl Comments for PgCommentStore {
    async fn create(&self, comment: &mut Comment) -> Result<(), StoreError> {
        let (id, created_at) = bounded(self.timeout, async {
            sqlx::query_as::<_, (i64, OffsetDateTime)>(
                r#"
                INSERT INTO comments (post_id, user_id, content)
                VALUES ($1, $2, $3)
                RETURNING id, created_at
                "#,
            )
            .bind(comment.post_id)
            .bind(comment.user_id)
            .bind(&comment.content)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
        })
        .await?;
        comment.id = id;
        comment.created_at = created_at;
        Ok(())
    }

    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Comment>, StoreError> {
        bounded(self.timeout, async {
            sqlx::query_as::<_, Comment>(
                r#"
                SELECT id, post_id, user_id, content, created_at
                FROM comments
                WHERE post_id = $1
                ORDER BY created_at DESC, id DESC
                "#,
            )
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
        })
        .await
    }
}
