use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, put},
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;
use verdant_types::{CreatePlanRequest, PlanDetails, UpdatePlanRequest};

use crate::{
    adapters::http::{app_state::AppState, routes::common::require_admin},
    app_error::AppResult,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_plan))
        .route("/{id}", put(update_plan).delete(archive_plan))
}

async fn list_all(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<Json<Vec<PlanDetails>>> {
    require_admin(&headers, &jar, &app_state)?;
    let plans = app_state.plan_use_cases.list_all().await?;
    Ok(Json(plans.iter().map(|p| p.to_details()).collect()))
}

async fn create_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<CreatePlanRequest>,
) -> AppResult<(StatusCode, Json<PlanDetails>)> {
    require_admin(&headers, &jar, &app_state)?;
    let plan = app_state.plan_use_cases.create(payload).await?;
    Ok((StatusCode::CREATED, Json(plan.to_details())))
}

async fn update_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePlanRequest>,
) -> AppResult<Json<PlanDetails>> {
    require_admin(&headers, &jar, &app_state)?;
    let plan = app_state.plan_use_cases.update(id, payload).await?;
    Ok(Json(plan.to_details()))
}

/// Plans are archived, never deleted: subscriptions keep pointing at them.
async fn archive_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PlanDetails>> {
    require_admin(&headers, &jar, &app_state)?;
    let plan = app_state.plan_use_cases.archive(id).await?;
    Ok(Json(plan.to_details()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum_test::TestServer;
    use serde_json::json;

    use crate::test_utils::{
        TestAppStateBuilder, access_token_for, create_test_admin, create_test_plan,
        create_test_user,
    };

    fn build_test_router(app_state: AppState) -> Router<()> {
        router().with_state(app_state)
    }

    #[tokio::test]
    async fn non_admin_is_forbidden() {
        let user = create_test_user(|_| {});
        let server = TestServer::new(build_test_router(TestAppStateBuilder::new().build())).unwrap();

        let response = server
            .post("/")
            .add_header("Authorization", format!("Bearer {}", access_token_for(&user)))
            .json(&json!({ "name": "Pro", "pricePaise": 99900, "durationDays": 30, "features": [] }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_creates_plan_with_defaults() {
        let admin = create_test_admin(|_| {});
        let server = TestServer::new(build_test_router(TestAppStateBuilder::new().build())).unwrap();

        let response = server
            .post("/")
            .add_header("Authorization", format!("Bearer {}", access_token_for(&admin)))
            .json(&json!({
                "name": "  Pro  ",
                "pricePaise": 99900,
                "durationDays": 90,
                "features": ["Live classes"]
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let plan: PlanDetails = response.json();
        assert_eq!(plan.name, "Pro");
        assert_eq!(plan.currency, "INR");
        assert!(plan.is_active);
    }

    #[tokio::test]
    async fn admin_rejects_non_positive_price() {
        let admin = create_test_admin(|_| {});
        let server = TestServer::new(build_test_router(TestAppStateBuilder::new().build())).unwrap();

        let response = server
            .post("/")
            .add_header("Authorization", format!("Bearer {}", access_token_for(&admin)))
            .json(&json!({ "name": "Free", "pricePaise": 0, "durationDays": 30, "features": [] }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_then_archive_shows_in_admin_list() {
        let admin = create_test_admin(|_| {});
        let plan = create_test_plan(|_| {});
        let id = plan.id;
        let app_state = TestAppStateBuilder::new().with_plan(plan).build();
        let server = TestServer::new(build_test_router(app_state)).unwrap();
        let auth = format!("Bearer {}", access_token_for(&admin));

        let updated: PlanDetails = server
            .put(&format!("/{id}"))
            .add_header("Authorization", auth.clone())
            .json(&json!({ "pricePaise": 59900 }))
            .await
            .json();
        assert_eq!(updated.price_paise, 59900);

        let archived = server
            .delete(&format!("/{id}"))
            .add_header("Authorization", auth.clone())
            .await;
        archived.assert_status_ok();
        assert!(!archived.json::<PlanDetails>().is_active);

        let all: Vec<PlanDetails> = server
            .get("/")
            .add_header("Authorization", auth)
            .await
            .json();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active);
    }
}
