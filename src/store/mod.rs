use std::{future::Future, sync::Arc, time::Duration};

use sqlx::PgPool;

use crate::error::StoreError;

pub mod comments;
pub mod followers;
#[cfg(test)]
pub mod memory;
pub mod posts;
pub mod postgres;
pub mod tx;
pub mod users;

use comments::{Comments, PgCommentStore};
use followers::{Followers, PgFollowerStore};
use posts::{PgPostStore, Posts};
use postgres::PgBackend;
use users::{UserStore, Users};

/// The storage collaborators handed to the HTTP layer.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn Users>,
    pub posts: Arc<dyn Posts>,
    pub comments: Arc<dyn Comments>,
    pub followers: Arc<dyn Followers>,
}

impl Storage {
    /// Every call made through the returned stores is bounded by `timeout`.
    pub fn postgres(pool: PgPool, timeout: Duration) -> Self {
        Self {
            users: Arc::new(UserStore::new(PgBackend::new(pool.clone()), timeout)),
            posts: Arc::new(PgPostStore::new(pool.clone(), timeout)),
            comments: Arc::new(PgCommentStore::new(pool.clone(), timeout)),
            followers: Arc::new(PgFollowerStore::new(pool, timeout)),
        }
    }

    #[cfg(test)]
    pub fn in_memory(backend: &memory::MemoryBackend) -> Self {
        Self {
            users: Arc::new(UserStore::new(backend.clone(), Duration::from_secs(2))),
            posts: Arc::new(backend.clone()),
            comments: Arc::new(backend.clone()),
            followers: Arc::new(backend.clone()),
        }
    }
}

/// Runs `fut` under the per-call ceiling.
pub(crate) async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| StoreError::Timeout)?
}
