use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failures of the credential, rated-image and session stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("Duplicate value for {0}")]
    Duplicate(String),

    /// A PostgreSQL error.
    #[error("Database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// The connection pool could not hand out a client.
    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A row was missing an expected column.
    #[error("Missing data: {0}")]
    MissingData(String),
}

/// Failures of the blob store.
#[derive(Error, Debug)]
pub enum BlobError {
    /// No blob is stored under the name.
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// A blob already exists under the name. The existing blob is untouched.
    #[error("Blob name already in use: {0}")]
    NameCollision(String),

    /// Reading the source stream failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<tokio_postgres::Error> for BlobError {
    fn from(e: tokio_postgres::Error) -> Self {
        BlobError::Store(StoreError::Postgres(e))
    }
}

impl From<deadpool_postgres::PoolError> for BlobError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        BlobError::Store(StoreError::Pool(e))
    }
}

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The upload carried no `image` field.
    #[error("No file uploaded")]
    NoFileProvided,

    /// The upload carried more than one `image` field.
    #[error("Only one file may be uploaded per request")]
    TooManyFiles,

    /// The upload exceeded the configured size cap.
    #[error("File exceeds maximum size of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// A unique value is already taken.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unknown email or wrong password. Both cases share this variant.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// No valid session accompanied the request.
    #[error("User not authenticated")]
    Unauthenticated,

    /// A user or blob does not exist.
    #[error("{0}")]
    NotFound(&'static str),

    /// A generated blob name was already in use.
    #[error("Blob name collision: {0}")]
    NameCollision(String),

    /// Streaming the upload into the blob store failed.
    #[error("Blob write failed: {0}")]
    BlobWriteFailed(String),

    /// An underlying store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// The HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::NoFileProvided
            | AppError::TooManyFiles
            | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InvalidCredentials | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NameCollision(_) => StatusCode::CONFLICT,
            AppError::BlobWriteFailed(_) | AppError::Store(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Store(ref e) => {
                tracing::error!("Store error: {}", e);
                "Database error".to_string()
            }

            AppError::BlobWriteFailed(ref msg) => {
                tracing::error!("Blob write failed: {}", msg);
                "Error uploading file".to_string()
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }

            AppError::NameCollision(ref name) => {
                tracing::warn!("Blob name collision: {}", name);
                "Generated file name already in use, please retry".to_string()
            }

            AppError::InvalidCredentials | AppError::Unauthenticated => {
                tracing::warn!("Authentication failed: {}", self);
                self.to_string()
            }

            AppError::Conflict(ref msg) | AppError::Validation(ref msg) => {
                tracing::debug!("Rejected request: {}", msg);
                msg.clone()
            }

            AppError::NotFound(msg) => {
                tracing::debug!("Resource not found: {}", msg);
                msg.to_string()
            }

            AppError::NoFileProvided
            | AppError::TooManyFiles
            | AppError::PayloadTooLarge { .. } => {
                tracing::debug!("Rejected upload: {}", self);
                self.to_string()
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "success": false,
            "message": message
        }))
        .unwrap_or_else(|_| r#"{"success":false,"message":"Internal server error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_expected_status_codes() {
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NoFileProvided.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::TooManyFiles.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::PayloadTooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotFound("File not found").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Store(StoreError::Serialization("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_detail_is_not_leaked_to_the_client() {
        let response =
            AppError::Store(StoreError::MissingData("password_hash".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
