use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use futures::{stream, StreamExt};
use uuid::Uuid;

use crate::{
    db::is_unique_violation,
    error::{BlobError, StoreError},
    models::blob::{BlobDownload, BlobInfo},
    storage::blob::{fill_chunk, BlobStore, BoxReader},
};

/// Blob store keeping chunk rows in PostgreSQL.
///
/// `blob_files` holds one row per blob (unique `filename`), `blob_chunks`
/// holds its bytes split into `chunk_size` pieces numbered from 0. A blob is
/// written inside one transaction, so readers never observe a partial blob.
#[derive(Clone)]
pub struct PgBlobStore {
    pool: Pool,
    chunk_size: usize,
}

impl PgBlobStore {
    pub fn new(pool: Pool, chunk_size: usize) -> Self {
        Self { pool, chunk_size }
    }
}

#[async_trait]
impl BlobStore for PgBlobStore {
    async fn put_stream(&self, name: &str, mut reader: BoxReader) -> Result<BlobInfo, BlobError> {
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        let file_id = Uuid::new_v4();
        let chunk_size = i32::try_from(self.chunk_size).unwrap_or(i32::MAX);

        transaction
            .execute(
                r#"
                INSERT INTO blob_files (id, filename, length, chunk_size, chunk_count)
                VALUES ($1, $2, 0, $3, 0)
                "#,
                &[&file_id, &name, &chunk_size],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    BlobError::NameCollision(name.to_string())
                } else {
                    BlobError::from(e)
                }
            })?;

        let insert_chunk = transaction
            .prepare("INSERT INTO blob_chunks (files_id, n, data) VALUES ($1, $2, $3)")
            .await?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut chunk_count: i32 = 0;
        let mut length: u64 = 0;

        loop {
            let filled = fill_chunk(&mut reader, &mut buf).await?;
            if filled == 0 {
                break;
            }

            let data: &[u8] = &buf[..filled];
            transaction
                .execute(&insert_chunk, &[&file_id, &chunk_count, &data])
                .await?;

            chunk_count += 1;
            length += filled as u64;

            if filled < buf.len() {
                break;
            }
        }

        let row = transaction
            .query_one(
                r#"
                UPDATE blob_files
                SET length = $2, chunk_count = $3
                WHERE id = $1
                RETURNING upload_date
                "#,
                &[&file_id, &(length as i64), &chunk_count],
            )
            .await?;
        let uploaded_at: DateTime<Utc> = row.try_get("upload_date")?;

        transaction.commit().await?;

        tracing::debug!(
            "Blob {} written: {} bytes in {} chunks",
            name,
            length,
            chunk_count
        );

        Ok(BlobInfo {
            name: name.to_string(),
            length,
            chunk_size: self.chunk_size,
            chunk_count: chunk_count as u32,
            uploaded_at,
        })
    }

    async fn open_download(&self, name: &str) -> Result<BlobDownload, BlobError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, length, chunk_count
                FROM blob_files
                WHERE filename = $1
                "#,
                &[&name],
            )
            .await?
            .ok_or_else(|| BlobError::NotFound(name.to_string()))?;

        let file_id: Uuid = row
            .try_get("id")
            .map_err(|_| StoreError::MissingData("id".to_string()))?;
        let length: i64 = row
            .try_get("length")
            .map_err(|_| StoreError::MissingData("length".to_string()))?;
        let chunk_count: i32 = row
            .try_get("chunk_count")
            .map_err(|_| StoreError::MissingData("chunk_count".to_string()))?;
        drop(client);

        let pool = self.pool.clone();
        let chunks = stream::try_unfold(0i32, move |n| {
            let pool = pool.clone();
            async move {
                if n >= chunk_count {
                    return Ok(None);
                }

                let client = pool.get().await?;
                let row = client
                    .query_opt(
                        "SELECT data FROM blob_chunks WHERE files_id = $1 AND n = $2",
                        &[&file_id, &n],
                    )
                    .await?
                    .ok_or_else(|| {
                        BlobError::Io(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            format!("chunk {} of blob {} is missing", n, file_id),
                        ))
                    })?;
                let data: Vec<u8> = row.try_get("data")?;

                Ok::<_, BlobError>(Some((Bytes::from(data), n + 1)))
            }
        })
        .boxed();

        Ok(BlobDownload {
            name: name.to_string(),
            length: length.max(0) as u64,
            chunks,
        })
    }

    async fn exists(&self, name: &str) -> Result<bool, BlobError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT 1 FROM blob_files WHERE filename = $1", &[&name])
            .await?;
        Ok(row.is_some())
    }
}
