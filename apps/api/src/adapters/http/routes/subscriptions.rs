use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use verdant_types::{CancelSubscriptionRequest, SubscriptionDetails, SubscriptionStatusResponse};

use crate::{
    adapters::http::{
        app_state::AppState,
        routes::common::{current_user, parse_optional_json},
    },
    app_error::AppResult,
};

/// The signed-in user's own subscription.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(my_subscription))
        .route("/me/status", get(my_status))
        .route("/me/cancel", post(cancel_mine))
}

async fn my_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<Json<SubscriptionDetails>> {
    let caller = current_user(&headers, &jar, &app_state)?;
    let sub = app_state
        .subscription_use_cases
        .my_subscription(caller.id)
        .await?;
    Ok(Json(sub))
}

async fn my_status(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<Json<SubscriptionStatusResponse>> {
    let caller = current_user(&headers, &jar, &app_state)?;
    let status = app_state.subscription_use_cases.my_status(caller.id).await?;
    Ok(Json(status))
}

async fn cancel_mine(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Bytes,
) -> AppResult<Json<SubscriptionDetails>> {
    let caller = current_user(&headers, &jar, &app_state)?;
    let payload: CancelSubscriptionRequest = parse_optional_json(&body)?;
    let sub = app_state
        .subscription_use_cases
        .cancel_mine(caller.id, payload.reason)
        .await?;
    Ok(Json(sub))
}
