use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::{error::StoreError, models::rated_image::RatedImage};

/// Store of rated-image records.
#[async_trait]
pub trait RatedImageStore: Send + Sync {
    /// Records that `user_id` uploaded the blob `blob_name`.
    async fn create(&self, user_id: Uuid, blob_name: &str) -> Result<RatedImage, StoreError>;

    /// All records, newest first.
    async fn list(&self) -> Result<Vec<RatedImage>, StoreError>;
}

fn row_to_rated_image(row: &Row) -> Result<RatedImage, StoreError> {
    Ok(RatedImage {
        id: row.try_get("id").map_err(|_| StoreError::MissingData("id".to_string()))?,
        user_id: row.try_get("user_id").map_err(|_| StoreError::MissingData("user_id".to_string()))?,
        blob_name: row.try_get("blob_name").map_err(|_| StoreError::MissingData("blob_name".to_string()))?,
        created_at: row.try_get("created_at").map_err(|_| StoreError::MissingData("created_at".to_string()))?,
    })
}

/// [`RatedImageStore`] backed by the `rated_images` table.
#[derive(Clone)]
pub struct PgRatedImageStore {
    pool: Pool,
}

impl PgRatedImageStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RatedImageStore for PgRatedImageStore {
    async fn create(&self, user_id: Uuid, blob_name: &str) -> Result<RatedImage, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO rated_images (id, user_id, blob_name)
                VALUES ($1, $2, $3)
                RETURNING id, user_id, blob_name, created_at
                "#,
                &[&Uuid::new_v4(), &user_id, &blob_name],
            )
            .await?;
        row_to_rated_image(&row)
    }

    async fn list(&self) -> Result<Vec<RatedImage>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT id, user_id, blob_name, created_at
                FROM rated_images
                ORDER BY created_at DESC
                "#,
                &[],
            )
            .await?;
        rows.iter().map(row_to_rated_image).collect()
    }
}
