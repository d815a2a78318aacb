use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::BlobError;
use crate::models::blob::{BlobDownload, BlobInfo};

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Chunked binary-object repository addressed by name.
///
/// Blobs are immutable. Writing a name that is already taken fails with
/// [`BlobError::NameCollision`] and leaves the existing blob in place.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Streams `reader` into a new blob called `name`.
    ///
    /// The blob becomes visible only once the whole stream is written; a
    /// dropped future leaves nothing behind.
    async fn put_stream(&self, name: &str, reader: BoxReader) -> Result<BlobInfo, BlobError>;

    /// Opens a blob for streamed reading.
    async fn open_download(&self, name: &str) -> Result<BlobDownload, BlobError>;

    /// Check whether a blob exists.
    async fn exists(&self, name: &str) -> Result<bool, BlobError>;
}

/// Reads from `reader` until `buf` is full or the stream ends.
///
/// Returns the number of bytes placed in `buf`; zero means end of stream.
pub(crate) async fn fill_chunk(reader: &mut BoxReader, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
