use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{config::Config, handlers, middleware_layer, state::AppState};

/// Room for multipart framing on top of the file size cap.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::COOKIE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400))
}

/// Builds the application router.
///
/// Rate limiting needs the peer address and is layered on in `main`.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/signup", post(handlers::auth::signup))
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/rated-images", get(handlers::images::list_rated_images))
        .route(
            "/profile-picture/{filename}",
            get(handlers::images::profile_picture),
        )
        .route("/rated-image/{filename}", get(handlers::images::rated_image))
        .route("/health", get(handlers::images::health))
        .with_state(state.clone());

    let rated_upload_routes = Router::new()
        .route("/rated-image", post(handlers::images::upload_rated_image))
        .route("/upload/rated", post(handlers::images::upload_rated_image))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::optional_auth,
        ))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/user", get(handlers::user::get_user))
        .route("/user/update", put(handlers::user::update_user))
        .route(
            "/user/change-password",
            post(handlers::user::change_password),
        )
        .route("/upload/profile", post(handlers::images::upload_profile))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(public_routes)
        .merge(rated_upload_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(cors_layer(&state.config))
}
