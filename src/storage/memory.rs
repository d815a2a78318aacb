use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{stream, StreamExt};
use tokio::sync::RwLock;

use crate::{
    error::BlobError,
    models::blob::{BlobDownload, BlobInfo},
    storage::blob::{fill_chunk, BlobStore, BoxReader},
};

struct StoredBlob {
    chunks: Vec<Bytes>,
    length: u64,
}

/// Blob store holding chunks in process memory.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Arc<StoredBlob>>>,
    chunk_size: usize,
}

impl MemoryBlobStore {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            chunk_size: chunk_size.max(1),
        }
    }

    #[cfg(test)]
    pub(crate) async fn blob_count(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_stream(&self, name: &str, mut reader: BoxReader) -> Result<BlobInfo, BlobError> {
        if self.blobs.read().await.contains_key(name) {
            return Err(BlobError::NameCollision(name.to_string()));
        }

        let mut chunks = Vec::new();
        let mut length: u64 = 0;
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            let filled = fill_chunk(&mut reader, &mut buf).await?;
            if filled == 0 {
                break;
            }
            chunks.push(Bytes::copy_from_slice(&buf[..filled]));
            length += filled as u64;
            if filled < buf.len() {
                break;
            }
        }

        let uploaded_at = Utc::now();
        let chunk_count = chunks.len() as u32;

        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(name) {
            return Err(BlobError::NameCollision(name.to_string()));
        }
        blobs.insert(
            name.to_string(),
            Arc::new(StoredBlob { chunks, length }),
        );

        Ok(BlobInfo {
            name: name.to_string(),
            length,
            chunk_size: self.chunk_size,
            chunk_count,
            uploaded_at,
        })
    }

    async fn open_download(&self, name: &str) -> Result<BlobDownload, BlobError> {
        let blob = self
            .blobs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(name.to_string()))?;

        let chunks = stream::iter(blob.chunks.clone().into_iter().map(Ok::<_, BlobError>)).boxed();

        Ok(BlobDownload {
            name: name.to_string(),
            length: blob.length,
            chunks,
        })
    }

    async fn exists(&self, name: &str) -> Result<bool, BlobError> {
        Ok(self.blobs.read().await.contains_key(name))
    }
}
