use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::{
    db::is_unique_violation,
    error::StoreError,
    models::user::{NewUser, ProfileUpdate, User},
};

/// Persistent store of user identity and password hashes.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user. Fails with [`StoreError::Duplicate`] when the email is taken.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Finds a user by their (lowercased) email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Finds a user by their ID.
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    /// Applies a partial update. Returns `None` when the user does not exist.
    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, StoreError>;

    /// Points the user's profile picture at `blob_name`. Returns `false` when
    /// the user does not exist.
    async fn set_profile_image(&self, user_id: Uuid, blob_name: &str) -> Result<bool, StoreError>;

    /// Replaces the password hash. Returns `false` when the user does not exist.
    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool, StoreError>;
}

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id").map_err(|_| StoreError::MissingData("id".to_string()))?,
        first_name: row.try_get("first_name").map_err(|_| StoreError::MissingData("first_name".to_string()))?,
        last_name: row.try_get("last_name").map_err(|_| StoreError::MissingData("last_name".to_string()))?,
        email: row.try_get("email").map_err(|_| StoreError::MissingData("email".to_string()))?,
        password_hash: row.try_get("password_hash").map_err(|_| StoreError::MissingData("password_hash".to_string()))?,
        profile_image: row.try_get("profile_image").map_err(|_| StoreError::MissingData("profile_image".to_string()))?,
        created_at: row.try_get("created_at").map_err(|_| StoreError::MissingData("created_at".to_string()))?,
        updated_at: row.try_get("updated_at").map_err(|_| StoreError::MissingData("updated_at".to_string()))?,
    })
}

/// Maps a unique violation on `users.email` to [`StoreError::Duplicate`].
fn map_email_conflict(e: tokio_postgres::Error) -> StoreError {
    if is_unique_violation(&e) {
        StoreError::Duplicate("email".to_string())
    } else {
        StoreError::Postgres(e)
    }
}

/// [`UserStore`] backed by the `users` table.
#[derive(Clone)]
pub struct PgUserStore {
    pool: Pool,
}

impl PgUserStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO users (id, first_name, last_name, email, password_hash)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
                &[
                    &Uuid::new_v4(),
                    &new_user.first_name,
                    &new_user.last_name,
                    &new_user.email,
                    &new_user.password_hash,
                ],
            )
            .await
            .map_err(map_email_conflict)?;
        row_to_user(&row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT *
                FROM users
                WHERE email = $1
                "#,
                &[&email],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT *
                FROM users
                WHERE id = $1
                "#,
                &[&user_id],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                UPDATE users
                SET
                    first_name = COALESCE($2, first_name),
                    last_name = COALESCE($3, last_name),
                    email = COALESCE($4, email),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
                &[&user_id, &update.first_name, &update.last_name, &update.email],
            )
            .await
            .map_err(map_email_conflict)?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn set_profile_image(&self, user_id: Uuid, blob_name: &str) -> Result<bool, StoreError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                r#"
                UPDATE users
                SET profile_image = $2, updated_at = NOW()
                WHERE id = $1
                "#,
                &[&user_id, &blob_name],
            )
            .await?;
        Ok(updated > 0)
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool, StoreError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                r#"
                UPDATE users
                SET password_hash = $2, updated_at = NOW()
                WHERE id = $1
                "#,
                &[&user_id, &password_hash],
            )
            .await?;
        Ok(updated > 0)
    }
}
