use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Links a user to a stored blob.
#[derive(Clone, Debug)]
pub struct RatedImage {
    pub id: Uuid,
    /// Owning user. Assumed to exist; not enforced on read.
    pub user_id: Uuid,
    /// Name of the blob in the blob store.
    pub blob_name: String,
    pub created_at: DateTime<Utc>,
}

impl RatedImage {
    /// URL under which the image is served.
    pub fn image_url(&self) -> String {
        format!("/rated-image/{}", self.blob_name)
    }
}

/// One entry of `GET /rated-images`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedImageListItem {
    pub image_url: String,
}

impl From<&RatedImage> for RatedImageListItem {
    fn from(image: &RatedImage) -> Self {
        Self {
            image_url: image.image_url(),
        }
    }
}
