use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;
use verdant_types::PlanDetails;

use crate::{adapters::http::app_state::AppState, app_error::AppResult};

/// Public catalogue. Archived plans are hidden.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_plans))
        .route("/{id}", get(get_plan))
}

async fn list_plans(State(app_state): State<AppState>) -> AppResult<Json<Vec<PlanDetails>>> {
    let plans = app_state.plan_use_cases.list_active().await?;
    Ok(Json(plans.iter().map(|p| p.to_details()).collect()))
}

async fn get_plan(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PlanDetails>> {
    let plan = app_state.plan_use_cases.get_active(id).await?;
    Ok(Json(plan.to_details()))
}
