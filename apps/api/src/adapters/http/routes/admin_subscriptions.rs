use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;
use verdant_types::{
    AddNoteRequest, AdminSubscriptionView, CancelSubscriptionRequest, ChangePlanRequest,
    EditSubscriptionRequest, ExtendSubscriptionRequest, OfflineSubscriptionRequest,
    PaginatedSubscriptions, RenewSubscriptionRequest, SubscriptionDetails, SubscriptionListQuery,
};

use crate::{
    adapters::http::{
        app_state::AppState,
        routes::common::{parse_optional_json, require_admin},
    },
    app_error::AppResult,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subscriptions))
        .route("/offline", post(create_offline))
        .route("/{id}", get(get_subscription).put(edit_subscription))
        .route("/{id}/extend", post(extend))
        .route("/{id}/change-plan", post(change_plan))
        .route("/{id}/cancel", post(cancel))
        .route("/{id}/renew", post(renew))
        .route("/{id}/notes", post(add_note))
}

async fn list_subscriptions(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<SubscriptionListQuery>,
) -> AppResult<Json<PaginatedSubscriptions>> {
    require_admin(&headers, &jar, &app_state)?;
    let page = app_state.subscription_use_cases.list(query).await?;
    Ok(Json(page))
}

async fn get_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AdminSubscriptionView>> {
    require_admin(&headers, &jar, &app_state)?;
    let view = app_state.subscription_use_cases.get(id).await?;
    Ok(Json(view))
}

async fn create_offline(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<OfflineSubscriptionRequest>,
) -> AppResult<(StatusCode, Json<SubscriptionDetails>)> {
    let admin = require_admin(&headers, &jar, &app_state)?;
    let sub = app_state
        .subscription_use_cases
        .create_offline(admin.id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(sub)))
}

async fn extend(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<ExtendSubscriptionRequest>,
) -> AppResult<Json<SubscriptionDetails>> {
    let admin = require_admin(&headers, &jar, &app_state)?;
    let sub = app_state
        .subscription_use_cases
        .extend(admin.id, id, payload.days)
        .await?;
    Ok(Json(sub))
}

async fn change_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangePlanRequest>,
) -> AppResult<Json<SubscriptionDetails>> {
    let admin = require_admin(&headers, &jar, &app_state)?;
    let sub = app_state
        .subscription_use_cases
        .change_plan(admin.id, id, payload.plan_id)
        .await?;
    Ok(Json(sub))
}

async fn cancel(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<SubscriptionDetails>> {
    let admin = require_admin(&headers, &jar, &app_state)?;
    let payload: CancelSubscriptionRequest = parse_optional_json(&body)?;
    let sub = app_state
        .subscription_use_cases
        .cancel(admin.id, id, payload.reason)
        .await?;
    Ok(Json(sub))
}

async fn renew(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<RenewSubscriptionRequest>,
) -> AppResult<Json<SubscriptionDetails>> {
    let admin = require_admin(&headers, &jar, &app_state)?;
    let sub = app_state
        .subscription_use_cases
        .renew(admin.id, id, payload.payment_method, payload.transaction_id)
        .await?;
    Ok(Json(sub))
}

async fn add_note(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddNoteRequest>,
) -> AppResult<Json<SubscriptionDetails>> {
    let admin = require_admin(&headers, &jar, &app_state)?;
    let sub = app_state
        .subscription_use_cases
        .add_note(admin.id, id, &payload.text)
        .await?;
    Ok(Json(sub))
}

/// Admin override of the end date (and optionally the plan).
async fn edit_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<EditSubscriptionRequest>,
) -> AppResult<Json<SubscriptionDetails>> {
    let admin = require_admin(&headers, &jar, &app_state)?;
    let sub = app_state
        .subscription_use_cases
        .admin_override(admin.id, id, payload.end_date, payload.plan_id)
        .await?;
    Ok(Json(sub))
}
