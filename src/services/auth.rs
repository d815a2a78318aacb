use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::{
    crypto::{
        password::CredentialHasher,
        token::{generate_session_token, is_well_formed, SessionKeys},
    },
    error::{AppError, Result, StoreError},
    models::{
        session::{CurrentSession, Session},
        user::{NewUser, ProfileUpdate, User},
    },
    repositories::{session::SessionStore, user::UserStore},
    validation::auth::{normalize_email, validate_password},
};

/// Session lifetime settings.
#[derive(Clone, Copy, Debug)]
pub struct SessionPolicy {
    /// Lifetime of a session in seconds.
    pub ttl_secs: u64,
    /// Whether each authenticated request restarts the lifetime.
    pub sliding: bool,
}

/// Verifies credentials, issues sessions and resolves them back to users.
#[derive(Clone)]
pub struct AuthGate {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    hasher: CredentialHasher,
    keys: SessionKeys,
    policy: SessionPolicy,
}

impl AuthGate {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        hasher: CredentialHasher,
        keys: SessionKeys,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            users,
            sessions,
            hasher,
            keys,
            policy,
        }
    }

    pub fn session_policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Creates a user.
    ///
    /// Fails with `Conflict` when the email is already registered; the
    /// existing record is left untouched.
    pub async fn register(
        &self,
        email: &str,
        password: Zeroizing<String>,
        first_name: String,
        last_name: String,
    ) -> Result<Uuid> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AppError::Validation("Email is required".to_string()));
        }
        validate_password(&password)?;

        tracing::debug!("Creating user: {}", email);
        let password_hash = self.hasher.hash_blocking(password).await?;

        let user = self
            .users
            .create(NewUser {
                first_name: first_name.trim().to_string(),
                last_name: last_name.trim().to_string(),
                email,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => AppError::Conflict("User already exists".to_string()),
                other => AppError::Store(other),
            })?;

        tracing::info!("User created with ID: {}", user.id);
        Ok(user.id)
    }

    /// Checks credentials and opens a session.
    ///
    /// Returns the user and the opaque token the client must present. An
    /// unknown email and a wrong password fail identically.
    pub async fn login(&self, email: &str, password: Zeroizing<String>) -> Result<(User, String)> {
        let email = normalize_email(email);
        let user = self.users.find_by_email(&email).await?;

        let verified = self
            .hasher
            .verify_blocking(password, user.as_ref().map(|u| u.password_hash.clone()))
            .await?;

        let user = match user {
            Some(user) if verified => user,
            _ => return Err(AppError::InvalidCredentials),
        };

        let token = generate_session_token();
        let key = self.keys.store_key(&token);
        let session = Session::new(user.id, self.policy.ttl_secs);
        self.sessions
            .insert(&key, &session, self.policy.ttl_secs)
            .await?;

        tracing::info!("User authenticated: {}", user.id);
        Ok((user, token))
    }

    /// Looks up the session for a client token.
    ///
    /// Malformed, unknown and expired tokens all resolve to `None`. With
    /// sliding expiry enabled the session lifetime restarts.
    pub async fn resolve_session(&self, token: &str) -> Result<Option<CurrentSession>> {
        if !is_well_formed(token) {
            return Ok(None);
        }

        let key = self.keys.store_key(token);
        let Some(mut session) = self.sessions.get(&key).await? else {
            return Ok(None);
        };

        if session.is_expired() {
            tracing::debug!("Session expired for user: {}", session.user_id);
            self.sessions.remove(&key).await?;
            return Ok(None);
        }

        if self.policy.sliding {
            session.expires_at = Utc::now() + chrono::Duration::seconds(self.policy.ttl_secs as i64);
            self.sessions
                .touch(&key, &session, self.policy.ttl_secs)
                .await?;
        }

        Ok(Some(CurrentSession { key, session }))
    }

    /// Invalidates the session behind `token`. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<()> {
        if !is_well_formed(token) {
            return Ok(());
        }
        self.sessions.remove(&self.keys.store_key(token)).await?;
        Ok(())
    }

    /// The user a session belongs to.
    pub async fn current_user(&self, user_id: Uuid) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User not found"))
    }

    /// Applies a partial profile update.
    pub async fn update_profile(&self, user_id: Uuid, mut update: ProfileUpdate) -> Result<User> {
        update.email = update.email.map(|email| normalize_email(&email));

        self.users
            .update_profile(user_id, &update)
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => AppError::Conflict("Email already in use".to_string()),
                other => AppError::Store(other),
            })?
            .ok_or(AppError::NotFound("User not found"))
    }

    /// Replaces the password after checking the current one.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: Zeroizing<String>,
        new_password: Zeroizing<String>,
    ) -> Result<()> {
        validate_password(&new_password)?;

        let user = self.current_user(user_id).await?;
        let verified = self
            .hasher
            .verify_blocking(old_password, Some(user.password_hash))
            .await?;
        if !verified {
            return Err(AppError::InvalidCredentials);
        }

        let new_hash = self.hasher.hash_blocking(new_password).await?;
        if !self.users.update_password(user_id, &new_hash).await? {
            return Err(AppError::NotFound("User not found"));
        }

        tracing::info!("Password changed for user: {}", user_id);
        Ok(())
    }
}
