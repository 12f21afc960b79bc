//! Cookie and caller helpers shared by the route modules.

use axum::{body::Bytes, http::HeaderMap};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use verdant_types::Role;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::jwt::{self, TokenKind},
    domain::entities::user::User,
};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
/// Readable by the frontend; also keys the per-email rate limit.
pub const EMAIL_COOKIE: &str = "user_email";

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

fn build_cookie(
    name: &'static str,
    value: String,
    http_only: bool,
    max_age: time::Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(http_only)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Issue a fresh access token and set it as a cookie.
pub fn set_access_cookie(
    jar: CookieJar,
    app_state: &AppState,
    user_id: Uuid,
    role: Role,
) -> AppResult<(CookieJar, String)> {
    let config = &app_state.config;
    let access = jwt::issue(
        user_id,
        role,
        TokenKind::Access,
        &config.jwt_secret,
        config.access_token_ttl,
    )?;
    let jar = jar.add(build_cookie(
        ACCESS_COOKIE,
        access.clone(),
        true,
        config.access_token_ttl,
        config.cookie_secure,
    ));
    Ok((jar, access))
}

/// Start a session: access, refresh and email cookies. Returns the access token.
pub fn start_session(
    jar: CookieJar,
    app_state: &AppState,
    user: &User,
) -> AppResult<(CookieJar, String)> {
    let config = &app_state.config;
    let refresh = jwt::issue(
        user.id,
        user.role,
        TokenKind::Refresh,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )?;
    let (jar, access) = set_access_cookie(jar, app_state, user.id, user.role)?;
    let jar = jar
        .add(build_cookie(
            REFRESH_COOKIE,
            refresh,
            true,
            config.refresh_token_ttl,
            config.cookie_secure,
        ))
        .add(build_cookie(
            EMAIL_COOKIE,
            user.email.clone(),
            false,
            config.refresh_token_ttl,
            config.cookie_secure,
        ));
    Ok((jar, access))
}

pub fn clear_session(jar: CookieJar, app_state: &AppState) -> CookieJar {
    let secure = app_state.config.cookie_secure;
    let gone = time::Duration::seconds(0);
    jar.add(build_cookie(ACCESS_COOKIE, String::new(), true, gone, secure))
        .add(build_cookie(REFRESH_COOKIE, String::new(), true, gone, secure))
        .add(build_cookie(EMAIL_COOKIE, String::new(), false, gone, secure))
}

/// Resolve the caller from `Authorization: Bearer`, falling back to the
/// access cookie.
pub fn current_user(
    headers: &HeaderMap,
    jar: &CookieJar,
    app_state: &AppState,
) -> AppResult<AuthUser> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let token = match bearer {
        Some(token) => token.to_owned(),
        None => jar
            .get(ACCESS_COOKIE)
            .map(|c| c.value().to_owned())
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthorized)?,
    };

    let claims = jwt::verify(&token, &app_state.config.jwt_secret, TokenKind::Access)?;
    Ok(AuthUser {
        id: claims.user_id()?,
        role: claims.role,
    })
}

pub fn require_admin(
    headers: &HeaderMap,
    jar: &CookieJar,
    app_state: &AppState,
) -> AppResult<AuthUser> {
    let user = current_user(headers, jar, app_state)?;
    if user.role != Role::Admin {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

/// Parse a JSON body that may be absent altogether.
pub fn parse_optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::InvalidInput(format!("Invalid JSON body: {e}")))
}
