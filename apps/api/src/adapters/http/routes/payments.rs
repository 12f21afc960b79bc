use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use axum_extra::extract::cookie::CookieJar;
use verdant_types::{
    CreateOrderRequest, OrderResponse, VerifyPaymentRequest, VerifyPaymentResponse,
};

use crate::{
    adapters::http::{app_state::AppState, routes::common::current_user},
    app_error::AppResult,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_order))
        .route("/verify", post(verify_payment))
}

async fn create_order(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<OrderResponse>> {
    let caller = current_user(&headers, &jar, &app_state)?;
    let order = app_state
        .payment_use_cases
        .create_order(caller.id, payload.plan_id)
        .await?;
    Ok(Json(order))
}

/// Called by the browser with the fields Razorpay checkout hands back.
async fn verify_payment(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<Json<VerifyPaymentResponse>> {
    let caller = current_user(&headers, &jar, &app_state)?;
    let result = app_state.payment_use_cases.verify(caller.id, payload).await?;
    Ok(Json(result))
}
