//! Process-local store implementations.
//!
//! Used by `STORAGE_BACKEND=memory` and by the test suite. Each store keeps
//! the same guarantees as its Postgres/Redis counterpart: email uniqueness is
//! checked and enforced under one write lock, and expired sessions read as
//! absent.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{
        rated_image::RatedImage,
        session::Session,
        user::{NewUser, ProfileUpdate, User},
    },
    repositories::{rated_image::RatedImageStore, session::SessionStore, user::UserStore},
};

#[derive(Default)]
struct UserTable {
    users: HashMap<Uuid, User>,
    by_email: HashMap<String, Uuid>,
}

/// In-memory [`UserStore`].
#[derive(Default)]
pub struct MemoryUserStore {
    table: RwLock<UserTable>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut table = self.table.write().await;

        if table.by_email.contains_key(&new_user.email) {
            return Err(StoreError::Duplicate("email".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            profile_image: None,
            created_at: now,
            updated_at: now,
        };

        table.by_email.insert(user.email.clone(), user.id);
        table.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .by_email
            .get(email)
            .and_then(|id| table.users.get(id))
            .cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.table.read().await.users.get(&user_id).cloned())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let mut table = self.table.write().await;

        let Some(current) = table.users.get(&user_id).cloned() else {
            return Ok(None);
        };

        if let Some(email) = &update.email {
            if table.by_email.get(email).is_some_and(|owner| *owner != user_id) {
                return Err(StoreError::Duplicate("email".to_string()));
            }
        }

        let mut updated = current.clone();
        update.apply(&mut updated);
        updated.updated_at = Utc::now();

        if updated.email != current.email {
            table.by_email.remove(&current.email);
            table.by_email.insert(updated.email.clone(), user_id);
        }
        table.users.insert(user_id, updated.clone());

        Ok(Some(updated))
    }

    async fn set_profile_image(&self, user_id: Uuid, blob_name: &str) -> Result<bool, StoreError> {
        let mut table = self.table.write().await;
        match table.users.get_mut(&user_id) {
            Some(user) => {
                user.profile_image = Some(blob_name.to_string());
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let mut table = self.table.write().await;
        match table.users.get_mut(&user_id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// In-memory [`RatedImageStore`].
#[derive(Default)]
pub struct MemoryRatedImageStore {
    images: RwLock<Vec<RatedImage>>,
}

impl MemoryRatedImageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RatedImageStore for MemoryRatedImageStore {
    async fn create(&self, user_id: Uuid, blob_name: &str) -> Result<RatedImage, StoreError> {
        let image = RatedImage {
            id: Uuid::new_v4(),
            user_id,
            blob_name: blob_name.to_string(),
            created_at: Utc::now(),
        };
        self.images.write().await.push(image.clone());
        Ok(image)
    }

    async fn list(&self) -> Result<Vec<RatedImage>, StoreError> {
        let images = self.images.read().await;
        Ok(images.iter().rev().cloned().collect())
    }
}

/// In-memory [`SessionStore`]. Expiry is checked on read.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, key: &str, session: &Session, _ttl_secs: u64) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(key.to_string(), session.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Session>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(key)
            .filter(|session| !session.is_expired())
            .cloned())
    }

    async fn touch(&self, key: &str, session: &Session, ttl_secs: u64) -> Result<(), StoreError> {
        self.insert(key, session, ttl_secs).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.sessions.write().await.remove(key);
        Ok(())
    }
}
