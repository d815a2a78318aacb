use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tower_cookies::cookie::{time::Duration, SameSite};
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::{AppError, Result},
    models::session::CurrentSession,
    state::AppState,
};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_id";

/// Session of the caller on routes where signing in is optional.
#[derive(Clone, Debug)]
pub struct MaybeSession(pub Option<CurrentSession>);

/// Extracts the session token from the request cookies.
pub fn extract_session_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Creates the session cookie.
pub fn create_session_cookie(value: String, max_age_secs: u64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_http_only(true);
    if secure {
        cookie.set_secure(true);
    }
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_secs as i64));
    cookie.set_path("/");
    cookie
}

/// Resolves the session behind the request cookie.
///
/// With sliding expiry the cookie is re-issued so its max-age follows the
/// refreshed session.
async fn resolve(state: &AppState, cookies: &Cookies) -> Result<Option<CurrentSession>> {
    let Some(token) = extract_session_token(cookies) else {
        return Ok(None);
    };

    let current = state.auth.resolve_session(&token).await?;
    let policy = state.auth.session_policy();
    if current.is_some() && policy.sliding {
        cookies.add(create_session_cookie(
            token,
            policy.ttl_secs,
            state.config.secure_cookies,
        ));
    }

    Ok(current)
}

/// A middleware that requires a valid session to be present.
///
/// The resolved [`CurrentSession`] is available to handlers as an extension.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let Some(current) = resolve(&state, &cookies).await? else {
        tracing::debug!("No valid session for {}", request.uri().path());
        return Err(AppError::Unauthenticated);
    };

    tracing::debug!("User authenticated: {}", current.session.user_id);
    request.extensions_mut().insert(current);

    Ok(next.run(request).await)
}

/// A middleware that resolves the session if there is one.
///
/// Handlers receive a [`MaybeSession`] either way.
pub async fn optional_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let current = resolve(&state, &cookies).await?;
    request.extensions_mut().insert(MaybeSession(current));

    Ok(next.run(request).await)
}
