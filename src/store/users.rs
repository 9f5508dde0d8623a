use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
    auth::{token, Password},
    error::StoreError,
    store::{
        bounded,
        tx::{run_in_transaction, TxBackend},
    },
};

/// User record.
///
/// `id` and `created_at` are assigned by storage; the values set by
/// [`User::new`] are placeholders until the row is inserted.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: Password,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_active: bool,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: 0,
            username: username.into(),
            email: email.into(),
            password: Password::default(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            is_active: false,
        }
    }
}

/// Table-level operations a lifecycle backend provides. Everything except
/// `find_user` runs inside a transaction handed in by the caller.
#[async_trait]
pub trait UserTables: TxBackend {
    /// Inserts the row and returns the generated `(id, created_at)`.
    async fn insert_user(
        &self,
        tx: &mut Self::Tx,
        user: &User,
    ) -> Result<(i64, OffsetDateTime), StoreError>;

    /// Stores an invitation, replacing any earlier one for the same user.
    async fn insert_invitation(
        &self,
        tx: &mut Self::Tx,
        token_digest: &str,
        user_id: i64,
        expiry: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Looks up the user owning a live invitation and locks that invitation
    /// for the rest of the transaction. Expired invitations are `NotFound`.
    async fn user_by_invitation(
        &self,
        tx: &mut Self::Tx,
        token_digest: &str,
        now: OffsetDateTime,
    ) -> Result<User, StoreError>;

    async fn update_user(&self, tx: &mut Self::Tx, user: &User) -> Result<(), StoreError>;

    /// `NotFound` when no row had that id.
    async fn delete_user(&self, tx: &mut Self::Tx, id: i64) -> Result<(), StoreError>;

    async fn delete_invitations(&self, tx: &mut Self::Tx, user_id: i64)
        -> Result<(), StoreError>;

    async fn find_user(&self, id: i64) -> Result<User, StoreError>;
}

/// What the HTTP layer sees of the user store.
#[async_trait]
pub trait Users: Send + Sync {
    /// Inserts `user` as-is in its own transaction.
    async fn create(&self, user: &mut User) -> Result<(), StoreError>;

    /// Inserts a pending user together with its invitation. `token` is the
    /// raw bearer token; only its digest is stored.
    async fn create_and_invite(
        &self,
        user: &mut User,
        token: &str,
        ttl: time::Duration,
    ) -> Result<(), StoreError>;

    async fn activate(&self, token: &str) -> Result<(), StoreError>;

    /// Removes the user and any outstanding invitation.
    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError>;
}

/// The user lifecycle: registration, activation and deletion over any
/// [`UserTables`] backend.
pub struct UserStore<B> {
    backend: B,
    timeout: Duration,
}

impl<B: UserTables> UserStore<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Inserts `user` inside `tx`, filling in its id and creation time.
    pub async fn create_in(&self, tx: &mut B::Tx, user: &mut User) -> Result<(), StoreError> {
        if !user.password.is_set() {
            return Err(StoreError::Hashing("password credential is not set".into()));
        }
        let (id, created_at) = self.backend.insert_user(tx, user).await?;
        user.id = id;
        user.created_at = created_at;
        debug!(user_id = id, username = %user.username, "user row inserted");
        Ok(())
    }
}

#[async_trait]
impl<B: UserTables> TxBackend for UserStore<B> {
    type Tx = B::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        self.backend.begin().await
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError> {
        self.backend.commit(tx).await
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError> {
        self.backend.rollback(tx).await
    }
}

#[async_trait]
impl<B: UserTables> Users for UserStore<B> {
    async fn create(&self, user: &mut User) -> Result<(), StoreError> {
        let pending = user.clone();
        let created = run_in_transaction(self, self.timeout, move |store, tx| {
            Box::pin(async move {
                let mut user = pending;
                store.create_in(tx, &mut user).await?;
                Ok::<_, StoreError>(user)
            })
        })
        .await?;
        *user = created;
        info!(user_id = user.id, "user created");
        Ok(())
    }

    async fn create_and_invite(
        &self,
        user: &mut User,
        token: &str,
        ttl: time::Duration,
    ) -> Result<(), StoreError> {
        let expiry = OffsetDateTime::now_utc()
            .checked_add(ttl)
            .ok_or(StoreError::InvalidExpiry)?;
        let pending = user.clone();
        let token_digest = token::digest(token);
        let created = run_in_transaction(self, self.timeout, move |store, tx| {
            Box::pin(async move {
                let mut user = pending;
                store.create_in(tx, &mut user).await?;
                store
                    .backend
                    .insert_invitation(tx, &token_digest, user.id, expiry)
                    .await?;
                Ok::<_, StoreError>(user)
            })
        })
        .await?;
        *user = created;
        info!(user_id = user.id, username = %user.username, "user created with invitation");
        Ok(())
    }

    async fn activate(&self, token: &str) -> Result<(), StoreError> {
        let token_digest = token::digest(token);
        let user_id = run_in_transaction(self, self.timeout, move |store, tx| {
            Box::pin(async move {
                let now = OffsetDateTime::now_utc();
                let mut user = store
                    .backend
                    .user_by_invitation(tx, &token_digest, now)
                    .await?;
                user.is_active = true;
                store.backend.update_user(tx, &user).await?;
                store.backend.delete_invitations(tx, user.id).await?;
                Ok::<_, StoreError>(user.id)
            })
        })
        .await?;
        info!(user_id, "user activated");
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        run_in_transaction(self, self.timeout, move |store, tx| {
            Box::pin(async move {
                store.backend.delete_user(tx, id).await?;
                store.backend.delete_invitations(tx, id).await?;
                Ok::<_, StoreError>(())
            })
        })
        .await?;
        info!(user_id = id, "user deleted");
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        bounded(self.timeout, self.backend.find_user(id)).await
    }
}
