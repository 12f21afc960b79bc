use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use verdant_types::{
    AuthResponse, CurrentUserResponse, LoginRequest, RefreshRequest, RefreshResponse,
    RegisterRequest,
};

use crate::{
    adapters::http::{
        app_state::AppState,
        routes::common::{
            REFRESH_COOKIE, clear_session, current_user, parse_optional_json, set_access_cookie,
            start_session,
        },
    },
    app_error::{AppError, AppResult},
    application::jwt::{self, TokenKind},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

async fn register(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let user = app_state
        .auth_use_cases
        .register(&payload.name, &payload.email, &payload.password)
        .await?;
    let (jar, access_token) = start_session(jar, &app_state, &user)?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            user: user.to_details(),
            access_token,
        }),
    ))
}

async fn login(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let user = app_state
        .auth_use_cases
        .login(&payload.email, &payload.password)
        .await?;
    let (jar, access_token) = start_session(jar, &app_state, &user)?;

    Ok((
        jar,
        Json(AuthResponse {
            user: user.to_details(),
            access_token,
        }),
    ))
}

/// Exchange the refresh cookie (or `refreshToken` body field) for a new
/// access token.
async fn refresh_token(
    State(app_state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let payload: RefreshRequest = parse_optional_json(&body)?;
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_owned())
        .filter(|t| !t.is_empty())
        .or(payload.refresh_token.filter(|t| !t.trim().is_empty()))
        .ok_or(AppError::Unauthorized)?;

    let claims = jwt::verify(&token, &app_state.config.jwt_secret, TokenKind::Refresh)?;
    // Role comes from the stored user so promotions and demotions apply here.
    let user = match app_state.auth_use_cases.get_user(claims.user_id()?).await {
        Ok(user) => user,
        Err(AppError::NotFound) => return Err(AppError::Unauthorized),
        Err(e) => return Err(e),
    };
    let (jar, access_token) = set_access_cookie(jar, &app_state, user.id, user.role)?;

    Ok((jar, Json(RefreshResponse { access_token })))
}

async fn logout(State(app_state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (
        clear_session(jar, &app_state),
        Json(serde_json::json!({ "success": true })),
    )
}

async fn me(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<Json<CurrentUserResponse>> {
    let caller = current_user(&headers, &jar, &app_state)?;
    let user = match app_state.auth_use_cases.get_user(caller.id).await {
        Ok(user) => user,
        Err(AppError::NotFound) => return Err(AppError::Unauthorized),
        Err(e) => return Err(e),
    };
    Ok(Json(CurrentUserResponse {
        user: user.to_details(),
    }))
}
