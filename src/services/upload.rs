use std::sync::Arc;

use axum::extract::{multipart::MultipartError, Multipart};
use bytes::Bytes;
use futures::stream;
use http::StatusCode;
use tokio_util::io::StreamReader;
use uuid::Uuid;

use crate::{
    error::{AppError, BlobError, Result},
    models::blob::BlobInfo,
    repositories::{rated_image::RatedImageStore, user::UserStore},
    storage::blob::{BlobStore, BoxReader},
    validation::filename::sanitize_upload_filename,
};

/// Multipart field that carries the uploaded file.
pub const IMAGE_FIELD: &str = "image";

/// Where a finished upload gets recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadTarget {
    /// Replaces the owner's profile picture reference.
    Profile,
    /// Appends a rated-image record owned by the uploader.
    Rated,
}

/// A file read from a multipart body, held in memory until it is written.
#[derive(Debug)]
pub struct IncomingFile {
    pub original_filename: String,
    pub chunks: Vec<Bytes>,
    pub size: usize,
}

/// The blob that was written and whether a record now points at it.
#[derive(Debug)]
pub struct StoredUpload {
    pub blob: BlobInfo,
    pub original_filename: String,
    /// `false` only for anonymous rated uploads, which have no owner.
    pub recorded: bool,
}

/// Result of a completed blob write.
#[derive(Debug)]
pub enum UploadOutcome {
    /// The blob and its reference are both in place.
    Stored(StoredUpload),
    /// The blob is stored but recording it failed. It stays as an orphan.
    StoredButReferenceUpdateFailed { upload: StoredUpload, reason: String },
}

/// Reads the single `image` field of a multipart body.
///
/// The body is consumed up to `max_bytes`; one byte more fails the whole
/// request before anything is written.
pub async fn receive_single_file(multipart: &mut Multipart, max_bytes: usize) -> Result<IncomingFile> {
    let mut received: Option<IncomingFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            tracing::debug!("upload: skipping field {:?}", field.name());
            continue;
        }

        if received.is_some() {
            tracing::debug!("upload: rejected, more than one file");
            return Err(AppError::TooManyFiles);
        }

        let original_filename = field.file_name().unwrap_or("file").to_string();
        tracing::debug!("upload: receiving {}", original_filename);

        let mut chunks = Vec::new();
        let mut size = 0usize;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?
        {
            size += chunk.len();
            if size > max_bytes {
                tracing::debug!("upload: rejected, exceeds {} bytes", max_bytes);
                return Err(AppError::PayloadTooLarge { limit: max_bytes });
            }
            chunks.push(chunk);
        }

        received = Some(IncomingFile {
            original_filename,
            chunks,
            size,
        });
    }

    received.ok_or(AppError::NoFileProvided)
}

fn multipart_error(e: MultipartError, max_bytes: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit: max_bytes }
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", e.body_text()))
    }
}

/// Name for a new blob: a time-ordered unique prefix plus the sanitized
/// client filename.
pub fn generate_blob_name(original_filename: &str) -> String {
    format!(
        "upload-{}-{}",
        Uuid::now_v7().simple(),
        sanitize_upload_filename(original_filename)
    )
}

/// Streams received files into the blob store and records them.
#[derive(Clone)]
pub struct UploadPipeline {
    blobs: Arc<dyn BlobStore>,
    users: Arc<dyn UserStore>,
    rated_images: Arc<dyn RatedImageStore>,
    max_upload_bytes: usize,
}

impl UploadPipeline {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        users: Arc<dyn UserStore>,
        rated_images: Arc<dyn RatedImageStore>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            blobs,
            users,
            rated_images,
            max_upload_bytes,
        }
    }

    /// Reads the single file of `multipart` and stores it for `target`.
    pub async fn upload(
        &self,
        owner: Option<Uuid>,
        target: UploadTarget,
        multipart: &mut Multipart,
    ) -> Result<UploadOutcome> {
        tracing::debug!("upload: received {:?} request", target);
        let file = receive_single_file(multipart, self.max_upload_bytes).await?;
        self.store(owner, target, file).await
    }

    /// Writes `file` as a new blob and records it for `target`.
    ///
    /// Profile uploads need an owner. Rated uploads without an owner store
    /// the blob and skip the record.
    pub async fn store(
        &self,
        owner: Option<Uuid>,
        target: UploadTarget,
        file: IncomingFile,
    ) -> Result<UploadOutcome> {
        if target == UploadTarget::Profile && owner.is_none() {
            return Err(AppError::Unauthenticated);
        }

        let name = generate_blob_name(&file.original_filename);
        tracing::debug!("upload: writing {} ({} bytes)", name, file.size);

        let reader: BoxReader = Box::new(StreamReader::new(stream::iter(
            file.chunks.into_iter().map(Ok::<_, std::io::Error>),
        )));

        let blob = self
            .blobs
            .put_stream(&name, reader)
            .await
            .map_err(|e| {
                tracing::debug!("upload: write of {} failed", name);
                match e {
                    BlobError::NameCollision(name) => AppError::NameCollision(name),
                    other => AppError::BlobWriteFailed(other.to_string()),
                }
            })?;

        tracing::debug!("upload: stored {} in {} chunks", blob.name, blob.chunk_count);

        let mut upload = StoredUpload {
            blob,
            original_filename: file.original_filename,
            recorded: false,
        };

        let Some(user_id) = owner else {
            tracing::info!("Anonymous rated image stored without record: {}", upload.blob.name);
            return Ok(UploadOutcome::Stored(upload));
        };

        let recorded = match target {
            UploadTarget::Profile => self
                .users
                .set_profile_image(user_id, &upload.blob.name)
                .await
                .map_err(|e| e.to_string())
                .and_then(|updated| {
                    if updated {
                        Ok(())
                    } else {
                        Err("user no longer exists".to_string())
                    }
                }),
            UploadTarget::Rated => self
                .rated_images
                .create(user_id, &upload.blob.name)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
        };

        match recorded {
            Ok(()) => {
                upload.recorded = true;
                tracing::info!("Upload complete for user {}: {}", user_id, upload.blob.name);
                Ok(UploadOutcome::Stored(upload))
            }
            Err(reason) => {
                tracing::error!(
                    "Blob {} stored but recording it for user {} failed: {}",
                    upload.blob.name,
                    user_id,
                    reason
                );
                Ok(UploadOutcome::StoredButReferenceUpdateFailed { upload, reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::NewUser;
    use crate::repositories::memory::{MemoryRatedImageStore, MemoryUserStore};
    use crate::storage::memory::MemoryBlobStore;
    use axum::{body::Body, extract::FromRequest, http::Request};
    use futures::TryStreamExt;

    const BOUNDARY: &str = "X-UPLOAD-BOUNDARY";

    fn part(name: &str, filename: &str, data: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        out.extend_from_slice(data);
        out.extend_from_slice(b"\r\n");
        out
    }

    async fn multipart(parts: &[Vec<u8>]) -> Multipart {
        let mut body: Vec<u8> = parts.concat();
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    fn file(name: &str, data: &[u8]) -> IncomingFile {
        IncomingFile {
            original_filename: name.to_string(),
            chunks: vec![Bytes::copy_from_slice(data)],
            size: data.len(),
        }
    }

    struct Fixture {
        pipeline: UploadPipeline,
        blobs: Arc<MemoryBlobStore>,
        users: Arc<MemoryUserStore>,
        rated: Arc<MemoryRatedImageStore>,
    }

    fn fixture() -> Fixture {
        let blobs = Arc::new(MemoryBlobStore::new(4));
        let users = Arc::new(MemoryUserStore::new());
        let rated = Arc::new(MemoryRatedImageStore::new());
        let pipeline = UploadPipeline::new(blobs.clone(), users.clone(), rated.clone(), 1024);
        Fixture {
            pipeline,
            blobs,
            users,
            rated,
        }
    }

    #[tokio::test]
    async fn receives_exactly_one_image_field() {
        let mut form = multipart(&[
            part("caption", "ignored.txt", b"hello"),
            part("image", "cat.png", b"0123456789"),
        ])
        .await;
        let received = receive_single_file(&mut form, 1024).await.unwrap();
        assert_eq!(received.original_filename, "cat.png");
        assert_eq!(received.size, 10);
        assert_eq!(received.chunks.concat(), b"0123456789");
    }

    #[tokio::test]
    async fn rejects_missing_and_extra_files() {
        let mut empty = multipart(&[part("caption", "a.txt", b"x")]).await;
        assert!(matches!(
            receive_single_file(&mut empty, 1024).await,
            Err(AppError::NoFileProvided)
        ));

        let mut two = multipart(&[part("image", "a.png", b"a"), part("image", "b.png", b"b")]).await;
        assert!(matches!(
            receive_single_file(&mut two, 1024).await,
            Err(AppError::TooManyFiles)
        ));
    }

    #[tokio::test]
    async fn rejects_files_over_the_cap() {
        let mut form = multipart(&[part("image", "big.bin", &[7u8; 33])]).await;
        assert!(matches!(
            receive_single_file(&mut form, 32).await,
            Err(AppError::PayloadTooLarge { limit: 32 })
        ));

        let mut exact = multipart(&[part("image", "ok.bin", &[7u8; 32])]).await;
        assert_eq!(receive_single_file(&mut exact, 32).await.unwrap().size, 32);
    }

    #[test]
    fn blob_names_are_unique_and_sanitized() {
        let a = generate_blob_name("../../etc/passwd");
        let b = generate_blob_name("../../etc/passwd");
        assert_ne!(a, b);
        assert!(a.starts_with("upload-"));
        assert!(a.ends_with("-passwd"));
        assert!(crate::validation::filename::is_valid_blob_name(&a));
    }

    #[tokio::test]
    async fn profile_upload_replaces_reference_and_keeps_bytes() {
        let fx = fixture();
        let user = fx
            .users
            .create(NewUser {
                first_name: String::new(),
                last_name: String::new(),
                email: "a@x.com".into(),
                password_hash: "h".into(),
            })
            .await
            .unwrap();

        let outcome = fx
            .pipeline
            .store(Some(user.id), UploadTarget::Profile, file("me.png", b"0123456789"))
            .await
            .unwrap();
        let UploadOutcome::Stored(upload) = outcome else {
            panic!("expected a recorded upload");
        };
        assert!(upload.recorded);
        assert_eq!(upload.blob.length, 10);
        assert_eq!(upload.blob.chunk_count, 3);

        let stored = fx.users.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.profile_image.as_deref(), Some(upload.blob.name.as_str()));

        let download = fx.blobs.open_download(&upload.blob.name).await.unwrap();
        let chunks: Vec<Bytes> = download.chunks.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"0123456789");
    }

    #[tokio::test]
    async fn profile_upload_for_vanished_user_reports_partial_success() {
        let fx = fixture();
        let outcome = fx
            .pipeline
            .store(Some(Uuid::new_v4()), UploadTarget::Profile, file("me.png", b"abc"))
            .await
            .unwrap();

        let UploadOutcome::StoredButReferenceUpdateFailed { upload, .. } = outcome else {
            panic!("expected partial success");
        };
        assert!(!upload.recorded);
        assert!(fx.blobs.exists(&upload.blob.name).await.unwrap());
    }

    #[tokio::test]
    async fn profile_upload_needs_an_owner() {
        let fx = fixture();
        let err = fx
            .pipeline
            .store(None, UploadTarget::Profile, file("me.png", b"abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }

    #[tokio::test]
    async fn anonymous_multipart_profile_upload_stores_nothing() {
        let fx = fixture();
        let mut form = multipart(&[part("image", "me.png", b"abc")]).await;
        let err = fx
            .pipeline
            .upload(None, UploadTarget::Profile, &mut form)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
        assert_eq!(fx.blobs.blob_count().await, 0);
    }

    #[tokio::test]
    async fn rated_upload_records_only_with_an_owner() {
        let fx = fixture();
        let owner = Uuid::new_v4();

        let UploadOutcome::Stored(owned) = fx
            .pipeline
            .store(Some(owner), UploadTarget::Rated, file("a.jpg", b"a"))
            .await
            .unwrap()
        else {
            panic!("expected stored");
        };
        assert!(owned.recorded);

        let UploadOutcome::Stored(anonymous) = fx
            .pipeline
            .store(None, UploadTarget::Rated, file("b.jpg", b"b"))
            .await
            .unwrap()
        else {
            panic!("expected stored");
        };
        assert!(!anonymous.recorded);
        assert!(fx.blobs.exists(&anonymous.blob.name).await.unwrap());

        let list = fx.rated.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].blob_name, owned.blob.name);
        assert_eq!(list[0].user_id, owner);
    }
}
