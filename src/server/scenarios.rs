use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt, parse_id};

const SCENARIO_NOT_FOUND: &str = "Scenario not found";

/// Scenarios are a shared catalog: any authenticated caller sees all of them.
pub fn scenario_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_scenarios))
        .route("/{id}", get(get_scenario))
}

pub async fn list_scenarios(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let scenarios = state
        .store
        .list_scenarios()
        .await
        .api_err("Failed to list scenarios")?;

    Ok::<_, ApiError>(Json(scenarios))
}

pub async fn get_scenario(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = parse_id(&id, SCENARIO_NOT_FOUND)?;

    let scenario = state
        .store
        .get_scenario(id)
        .await
        .api_err("Failed to get scenario")?
        .or_not_found(SCENARIO_NOT_FOUND)?;

    Ok::<_, ApiError>(Json(scenario))
}
