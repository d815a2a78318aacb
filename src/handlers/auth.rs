use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use garde::Validate;
use serde::{Deserialize, Serialize};
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};
use zeroize::Zeroizing;

use crate::{
    error::Result,
    middleware_layer::auth::{create_session_cookie, extract_session_token, SESSION_COOKIE},
    models::user::UserProfile,
    state::AppState,
    validation::auth::{json_body, non_blank, validate_request},
};

/// The request payload for user registration.
#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[garde(custom(non_blank), length(max = 254))]
    #[serde(default)]
    pub email: String,
    #[garde(length(min = 8, max = 128))]
    #[serde(default)]
    pub password: String,
    #[garde(length(max = 100))]
    #[serde(default)]
    pub first_name: String,
    #[garde(length(max = 100))]
    #[serde(default)]
    pub last_name: String,
}

/// The request payload for user login.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[garde(custom(non_blank), length(max = 254))]
    #[serde(default)]
    pub email: String,
    #[garde(length(min = 1, max = 128))]
    #[serde(default)]
    pub password: String,
}

/// The response payload for authentication-related requests.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub user: UserProfile,
}

/// Handles user registration.
pub async fn signup(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Response> {
    let payload = json_body(payload)?;
    validate_request(&payload)?;

    let user_id = state
        .auth
        .register(
            &payload.email,
            Zeroizing::new(payload.password),
            payload.first_name,
            payload.last_name,
        )
        .await?;

    tracing::info!("User registered: {}", user_id);

    let response = AuthResponse {
        success: true,
        message: "Signup successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles user login.
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response> {
    let payload = json_body(payload)?;
    validate_request(&payload)?;

    let (user, token) = state
        .auth
        .login(&payload.email, Zeroizing::new(payload.password))
        .await?;

    cookies.add(create_session_cookie(
        token,
        state.auth.session_policy().ttl_secs,
        state.config.secure_cookies,
    ));

    tracing::info!("User logged in: {}", user.id);

    let response = LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        user: UserProfile::from(&user),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles user logout. Succeeds whether or not a session was present.
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Result<Response> {
    if let Some(token) = extract_session_token(&cookies) {
        state.auth.logout(&token).await?;
        tracing::info!("Session closed");
    }

    let mut session_cookie = Cookie::new(SESSION_COOKIE, "");
    session_cookie.set_max_age(Duration::seconds(0));
    session_cookie.set_path("/");
    cookies.remove(session_cookie);

    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
