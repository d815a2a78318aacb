use std::sync::Arc;

use futures::{stream, StreamExt, TryStreamExt};

use crate::{
    error::{AppError, BlobError, Result},
    models::blob::ChunkStream,
    storage::blob::BlobStore,
    validation::filename::is_valid_blob_name,
};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A blob ready to be sent to a client.
pub struct ServedBlob {
    pub name: String,
    pub length: u64,
    pub content_type: &'static str,
    pub chunks: ChunkStream,
}

/// Resolves blob names to lazily streamed content.
#[derive(Clone)]
pub struct DownloadPipeline {
    blobs: Arc<dyn BlobStore>,
}

impl DownloadPipeline {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Opens `name` for streaming.
    ///
    /// Names that could never have been generated fail like missing ones.
    /// The first chunk is read up front to sniff the content type and put
    /// back in front of the rest.
    pub async fn download(&self, name: &str) -> Result<ServedBlob> {
        if !is_valid_blob_name(name) {
            tracing::debug!("download: rejected blob name {:?}", name);
            return Err(AppError::NotFound("File not found"));
        }

        let download = self.blobs.open_download(name).await.map_err(not_found_or_failure)?;
        let mut chunks = download.chunks;

        let first = chunks.try_next().await.map_err(not_found_or_failure)?;
        let content_type = first
            .as_deref()
            .and_then(infer::get)
            .map(|kind| kind.mime_type())
            .unwrap_or(FALLBACK_CONTENT_TYPE);

        tracing::debug!(
            "download: streaming {} ({} bytes, {})",
            download.name,
            download.length,
            content_type
        );

        Ok(ServedBlob {
            name: download.name,
            length: download.length,
            content_type,
            chunks: stream::iter(first.map(Ok::<_, BlobError>))
                .chain(chunks)
                .boxed(),
        })
    }
}

fn not_found_or_failure(e: BlobError) -> AppError {
    match e {
        BlobError::NotFound(_) => AppError::NotFound("File not found"),
        BlobError::Store(store) => AppError::Store(store),
        other => AppError::Internal(format!("Blob read failed: {}", other)),
    }
}
