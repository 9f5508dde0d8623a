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
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Post {
    pub fn new(user_id: i64, title: String, content: String, tags: Vec<String>) -> Self {
        Self {
            id: 0,
            user_id,
            title,
            content,
            tags,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }
}

#[async_trait]
pub trait Posts: Send + Sync {
    /// Inserts the post, filling in its id and timestamps.
    async fn create(&self, post: &mut Post) -> Result<(), StoreError>;
    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError>;
    async fn update(&self, post: &mut Post) -> Result<(), StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgPostStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgPostStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl Posts for PgPostStore {
    async fn create(&self, post: &mut Post) -> Result<(), StoreError> {
        let (id, created_at, updated_at) = bounded(self.timeout, async {
            sqlx::query_as::<_, (i64, OffsetDateTime, OffsetDateTime)>(
                r#"
                INSERT INTO posts (user_id, title, content, tags)
                VALUES ($1, $2, $3, $4)
                RETURNING id, created_at, updated_at
                "#,
            )
            .bind(post.user_id)
            .bind(&post.title)
            .bind(&post.content)
            .bind(&post.tags)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
        })
        .await?;
        post.id = id;
        post.created_at = created_at;
        post.updated_at = updated_at;
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError> {
        bounded(self.timeout, async {
            sqlx::query_as::<_, Post>(
                r#"
                SELECT id, user_id, title, content, tags, created_at, updated_at
                FROM posts
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
        })
        .await
    }

    async fn update(&self, post: &mut Post) -> Result<(), StoreError> {
        let updated_at = bounded(self.timeout, async {
            sqlx::query_scalar::<_, OffsetDateTime>(
                r#"
                UPDATE posts
                SET title = $1, content = $2, tags = $3, updated_at = NOW()
                WHERE id = $4
                RETURNING updated_at
                "#,
            )
            .bind(&post.title)
            .bind(&post.content)
            .bind(&post.tags)
            .bind(post.id)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
        })
        .await?;
        post.updated_at = updated_at;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = bounded(self.timeout, async {
            sqlx::query("DELETE FROM posts WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(classify)
        })
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
