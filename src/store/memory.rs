//! In-memory backend for tests.
//!
//! A transaction holds the table lock for its whole lifetime and works on a
//! staged copy, so transactions are serializable and a dropped transaction
//! leaves nothing behind. Sequences live outside the tables and are never
//! rolled back.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    auth::token,
    error::StoreError,
    store::{
        comments::{Comment, Comments},
        followers::Followers,
        posts::{Post, Posts},
        tx::TxBackend,
        users::{User, UserTables},
    },
};

#[derive(Clone)]
struct Invitation {
    token_digest: String,
    user_id: i64,
    expiry: OffsetDateTime,
}

#[derive(Clone, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    invitations: Vec<Invitation>,
    followers: BTreeSet<(i64, i64)>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
}

/// Table operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertInvitation,
    UpdateUser,
    DeleteInvitations,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    tables: Arc<Mutex<Tables>>,
    sequence: Arc<AtomicI64>,
    failing: Arc<std::sync::Mutex<Vec<FailPoint>>>,
}

pub struct MemoryTx {
    committed: OwnedMutexGuard<Tables>,
    staged: Tables,
}

impl MemoryBackend {
    /// Makes every later call at `point` fail with a storage error.
    pub fn fail_on(&self, point: FailPoint) {
        self.failing.lock().unwrap().push(point);
    }

    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        if self.failing.lock().unwrap().contains(&point) {
            return Err(StoreError::storage(std::io::Error::other(format!(
                "{point:?} failed"
            ))));
        }
        Ok(())
    }

    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }

    pub async fn invitation_count(&self, user_id: i64) -> usize {
        self.tables
            .lock()
            .await
            .invitations
            .iter()
            .filter(|i| i.user_id == user_id)
            .count()
    }

    pub async fn total_invitations(&self) -> usize {
        self.tables.lock().await.invitations.len()
    }

    pub async fn stores_raw_token(&self, raw: &str) -> bool {
        self.tables
            .lock()
            .await
            .invitations
            .iter()
            .any(|i| i.token_digest == raw)
    }

    pub async fn is_following(&self, follower_id: i64, user_id: i64) -> bool {
        self.tables
            .lock()
            .await
            .followers
            .contains(&(follower_id, user_id))
    }

    fn next_id(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl TxBackend for MemoryBackend {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let committed = self.tables.clone().lock_owned().await;
        let staged = committed.clone();
        Ok(MemoryTx { committed, staged })
    }

    async fn commit(&self, mut tx: MemoryTx) -> Result<(), StoreError> {
        *tx.committed = tx.staged;
        Ok(())
    }

    async fn rollback(&self, _tx: MemoryTx) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl UserTables for MemoryBackend {
    async fn insert_user(
        &self,
        tx: &mut MemoryTx,
        user: &User,
    ) -> Result<(i64, OffsetDateTime), StoreError> {
        let id = self.next_id();
        let users = &mut tx.staged.users;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if users.values().any(|u| u.username == user.username) {
            return Err(StoreError::DuplicateUsername);
        }
        let created_at = OffsetDateTime::now_utc();
        let mut row = user.clone();
        row.id = id;
        row.created_at = created_at;
        users.insert(id, row);
        Ok((id, created_at))
    }

    async fn insert_invitation(
        &self,
        tx: &mut MemoryTx,
        token_digest: &str,
        user_id: i64,
        expiry: OffsetDateTime,
    ) -> Result<(), StoreError> {
        self.check(FailPoint::InsertInvitation)?;
        if !tx.staged.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        let invitations = &mut tx.staged.invitations;
        invitations.retain(|i| i.user_id != user_id);
        invitations.push(Invitation {
            token_digest: token_digest.to_owned(),
            user_id,
            expiry,
        });
        Ok(())
    }

    async fn user_by_invitation(
        &self,
        tx: &mut MemoryTx,
        token_digest: &str,
        now: OffsetDateTime,
    ) -> Result<User, StoreError> {
        let staged = &tx.staged;
        staged
            .invitations
            .iter()
            .find(|i| i.token_digest == token_digest && !token::is_expired(i.expiry, now))
            .and_then(|i| staged.users.get(&i.user_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_user(&self, tx: &mut MemoryTx, user: &User) -> Result<(), StoreError> {
        self.check(FailPoint::UpdateUser)?;
        let row = tx
            .staged
            .users
            .get_mut(&user.id)
            .ok_or(StoreError::NotFound)?;
        row.username = user.username.clone();
        row.email = user.email.clone();
        row.is_active = user.is_active;
        Ok(())
    }

    async fn delete_user(&self, tx: &mut MemoryTx, id: i64) -> Result<(), StoreError> {
        let staged = &mut tx.staged;
        staged.users.remove(&id).ok_or(StoreError::NotFound)?;
        // the schema cascades these
        staged
            .followers
            .retain(|&(follower, followed)| follower != id && followed != id);
        let owned: Vec<i64> = staged
            .posts
            .values()
            .filter(|p| p.user_id == id)
            .map(|p| p.id)
            .collect();
        staged.posts.retain(|_, p| p.user_id != id);
        staged
            .comments
            .retain(|_, c| c.user_id != id && !owned.contains(&c.post_id));
        Ok(())
    }

    async fn delete_invitations(&self, tx: &mut MemoryTx, user_id: i64) -> Result<(), StoreError> {
        self.check(FailPoint::DeleteInvitations)?;
        tx.staged.invitations.retain(|i| i.user_id != user_id);
        Ok(())
    }

    async fn find_user(&self, id: i64) -> Result<User, StoreError> {
        self.tables
            .lock()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl Followers for MemoryBackend {
    async fn follow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&follower_id) || !tables.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        tables.followers.insert((follower_id, user_id));
        Ok(())
    }

    async fn unfollow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        self.tables
            .lock()
            .await
            .followers
            .remove(&(follower_id, user_id));
        Ok(())
    }
}

#[async_trait]
impl Posts for MemoryBackend {
    async fn create(&self, post: &mut Post) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&post.user_id) {
            return Err(StoreError::NotFound);
        }
        let now = OffsetDateTime::now_utc();
        post.id = self.next_id();
        post.created_at = now;
        post.updated_at = now;
        tables.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Post, StoreError> {
        self.tables
            .lock()
            .await
            .posts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, post: &mut Post) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let row = tables.posts.get_mut(&post.id).ok_or(StoreError::NotFound)?;
        row.title = post.title.clone();
        row.content = post.content.clone();
        row.tags = post.tags.clone();
        row.updated_at = OffsetDateTime::now_utc();
        post.updated_at = row.updated_at;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        tables.posts.remove(&id).ok_or(StoreError::NotFound)?;
        tables.comments.retain(|_, c| c.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl Comments for MemoryBackend {
    async fn create(&self, comment: &mut Comment) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if !tables.posts.contains_key(&comment.post_id)
            || !tables.users.contains_key(&comment.user_id)
        {
            return Err(StoreError::NotFound);
        }
        comment.id = self.next_id();
        comment.created_at = OffsetDateTime::now_utc();
        tables.comments.insert(comment.id, comment.clone());
        Ok(())
    }

    async fn get_by_post_id(&self, post_id: i64) -> Result<Vec<Comment>, StoreError> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::users::{UserStore, Users};

    async fn two_users(backend: &MemoryBackend) -> (i64, i64) {
        let users = UserStore::new(backend.clone(), Duration::from_secs(2));
        let mut ids = Vec::new();
        for name in ["follower", "followed"] {
            let mut user = User::new(name, format!("{name}@example.com"));
            user.password.set("secret123").unwrap();
            users.create(&mut user).await.unwrap();
            ids.push(user.id);
        }
        (ids[0], ids[1])
    }

    #[tokio::test]
    async fn follow_twice_is_not_an_error() {
        let backend = MemoryBackend::default();
        let (a, b) = two_users(&backend).await;
        backend.follow(a, b).await.unwrap();
        backend.follow(a, b).await.unwrap();
        assert!(backend.is_following(a, b).await);
        assert!(!backend.is_following(b, a).await);
    }

    #[tokio::test]
    async fn unfollow_missing_edge_is_not_an_error() {
        let backend = MemoryBackend::default();
        let (a, b) = two_users(&backend).await;
        backend.unfollow(a, b).await.unwrap();
        backend.follow(a, b).await.unwrap();
        backend.unfollow(a, b).await.unwrap();
        assert!(!backend.is_following(a, b).await);
    }

    #[tokio::test]
    async fn follow_unknown_user_is_not_found() {
        let backend = MemoryBackend::default();
        let (a, _) = two_users(&backend).await;
        assert!(matches!(
            backend.follow(a, 999).await.unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[tokio::test]
    async fn deleting_a_user_drops_its_edges() {
        let backend = MemoryBackend::default();
        let (a, b) = two_users(&backend).await;
        backend.follow(a, b).await.unwrap();
        UserStore::new(backend.clone(), Duration::from_secs(2))
            .delete(b)
            .await
            .unwrap();
        assert!(!backend.is_following(a, b).await);
    }
}
