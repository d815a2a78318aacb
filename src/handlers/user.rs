use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use garde::Validate;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{
    error::Result,
    handlers::auth::AuthResponse,
    models::{
        session::CurrentSession,
        user::{ProfileUpdate, UserProfile},
    },
    state::AppState,
    validation::auth::{json_body, normalize_optional, validate_request},
};

/// Fields of `PUT /user/update`. Missing or blank fields keep their value.
#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[garde(length(max = 100))]
    pub first_name: Option<String>,
    #[garde(length(max = 100))]
    pub last_name: Option<String>,
    #[garde(length(max = 254))]
    pub email: Option<String>,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[garde(length(min = 1, max = 128))]
    #[serde(default)]
    pub old_password: String,
    #[garde(length(min = 8, max = 128))]
    #[serde(default)]
    pub new_password: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: UserProfile,
}

/// Returns the signed-in user.
pub async fn get_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> Result<Response> {
    let user = state.auth.current_user(current.session.user_id).await?;

    Ok(Json(UserResponse {
        success: true,
        user: UserProfile::from(&user),
    })
    .into_response())
}

/// Updates name and email of the signed-in user.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    payload: std::result::Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Response> {
    let payload = json_body(payload)?;
    validate_request(&payload)?;

    let update = ProfileUpdate {
        first_name: normalize_optional(payload.first_name),
        last_name: normalize_optional(payload.last_name),
        email: normalize_optional(payload.email),
    };

    let user = state
        .auth
        .update_profile(current.session.user_id, update)
        .await?;
    tracing::info!("Profile updated for user: {}", user.id);

    Ok(Json(AuthResponse {
        success: true,
        message: "User details updated successfully".to_string(),
    })
    .into_response())
}

/// Handles changing a user's password.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    payload: std::result::Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Response> {
    let payload = json_body(payload)?;
    validate_request(&payload)?;

    state
        .auth
        .change_password(
            current.session.user_id,
            Zeroizing::new(payload.old_password),
            Zeroizing::new(payload.new_password),
        )
        .await?;

    Ok(Json(AuthResponse {
        success: true,
        message: "Password changed successfully".to_string(),
    })
    .into_response())
}
