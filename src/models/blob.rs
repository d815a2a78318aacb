use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::BlobError;

/// Metadata of a blob that finished writing.
#[derive(Clone, Debug)]
pub struct BlobInfo {
    pub name: String,
    pub length: u64,
    pub chunk_size: usize,
    pub chunk_count: u32,
    pub uploaded_at: DateTime<Utc>,
}

/// Stream of chunks read lazily from the store.
pub type ChunkStream = BoxStream<'static, Result<Bytes, BlobError>>;

/// An opened blob: its length and a lazy stream over its chunks.
pub struct BlobDownload {
    pub name: String,
    pub length: u64,
    pub chunks: ChunkStream,
}

impl std::fmt::Debug for BlobDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobDownload")
            .field("name", &self.name)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}
