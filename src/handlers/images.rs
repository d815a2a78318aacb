use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;

use crate::{
    config::RatedUploadPolicy,
    error::{AppError, Result},
    middleware_layer::auth::MaybeSession,
    models::{rated_image::RatedImageListItem, session::CurrentSession},
    services::upload::{StoredUpload, UploadOutcome, UploadTarget},
    state::AppState,
};

const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUploadResponse {
    pub message: String,
    pub image_url: String,
}

/// Description of a stored upload.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    pub image_url: String,
}

#[derive(Serialize)]
pub struct RatedUploadResponse {
    pub message: String,
    pub file: UploadedFile,
    pub recorded: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialUploadResponse {
    pub success: bool,
    pub stored: bool,
    pub image_url: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct RatedImagesResponse {
    pub success: bool,
    pub images: Vec<RatedImageListItem>,
}

fn multipart_body(
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Multipart> {
    multipart.map_err(|rejection| AppError::Validation(rejection.body_text()))
}

fn profile_url(name: &str) -> String {
    format!("/profile-picture/{}", name)
}

fn rated_url(name: &str) -> String {
    format!("/rated-image/{}", name)
}

/// The blob exists but nothing references it. Reported as a failure that
/// still names the stored blob.
fn partial_response(upload: &StoredUpload, image_url: String) -> Response {
    let body = PartialUploadResponse {
        success: false,
        stored: true,
        image_url,
        message: "File stored but could not be recorded".to_string(),
    };
    tracing::warn!("Partial upload reported for {}", upload.blob.name);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Replaces the signed-in user's profile picture.
pub async fn upload_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let mut multipart = multipart_body(multipart)?;
    let outcome = state
        .uploads
        .upload(Some(current.session.user_id), UploadTarget::Profile, &mut multipart)
        .await?;

    match outcome {
        UploadOutcome::Stored(upload) => Ok(Json(ProfileUploadResponse {
            message: "Profile picture updated successfully".to_string(),
            image_url: profile_url(&upload.blob.name),
        })
        .into_response()),
        UploadOutcome::StoredButReferenceUpdateFailed { upload, .. } => {
            let url = profile_url(&upload.blob.name);
            Ok(partial_response(&upload, url))
        }
    }
}

/// Stores a rated image, recorded for the signed-in user when there is one.
pub async fn upload_rated_image(
    State(state): State<AppState>,
    Extension(MaybeSession(current)): Extension<MaybeSession>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let owner = current.map(|c| c.session.user_id);
    if owner.is_none() && state.config.rated_upload_policy == RatedUploadPolicy::RequireSession {
        return Err(AppError::Unauthenticated);
    }
    let mut multipart = multipart_body(multipart)?;

    let outcome = state
        .uploads
        .upload(owner, UploadTarget::Rated, &mut multipart)
        .await?;

    match outcome {
        UploadOutcome::Stored(upload) => {
            let recorded = upload.recorded;
            Ok(Json(RatedUploadResponse {
                message: "File uploaded successfully".to_string(),
                file: UploadedFile {
                    image_url: rated_url(&upload.blob.name),
                    filename: upload.blob.name,
                    original_name: upload.original_filename,
                    size: upload.blob.length,
                },
                recorded,
            })
            .into_response())
        }
        UploadOutcome::StoredButReferenceUpdateFailed { upload, .. } => {
            let url = rated_url(&upload.blob.name);
            Ok(partial_response(&upload, url))
        }
    }
}

/// Lists every rated image, newest first.
pub async fn list_rated_images(State(state): State<AppState>) -> Result<Response> {
    let images = state.rated_images.list().await?;

    Ok(Json(RatedImagesResponse {
        success: true,
        images: images.iter().map(RatedImageListItem::from).collect(),
    })
    .into_response())
}

pub async fn profile_picture(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    stream_blob(&state, &filename).await
}

pub async fn rated_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    stream_blob(&state, &filename).await
}

/// Streams a blob chunk by chunk.
async fn stream_blob(state: &AppState, name: &str) -> Result<Response> {
    let served = state.downloads.download(name).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(served.content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(served.length));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE_CACHE));

    Ok((headers, Body::from_stream(served.chunks)).into_response())
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
