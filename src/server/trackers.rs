use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt, parse_id};
use crate::types::{NewTracker, TrackerPatch};

const TRACKER_NOT_FOUND: &str = "Tracker not found";

pub fn tracker_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_trackers).post(create_tracker))
        .route(
            "/{id}",
            get(get_tracker).put(update_tracker).delete(delete_tracker),
        )
        .route("/{id}/history", get(list_tracker_history))
}

pub async fn list_trackers(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let trackers = state
        .store
        .list_trackers(auth.user_id)
        .await
        .api_err("Failed to list trackers")?;

    Ok::<_, ApiError>(Json(trackers))
}

pub async fn get_tracker(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = parse_id(&id, TRACKER_NOT_FOUND)?;

    let tracker = state
        .store
        .get_tracker(id, auth.user_id)
        .await
        .api_err("Failed to get tracker")?
        .or_not_found(TRACKER_NOT_FOUND)?;

    Ok::<_, ApiError>(Json(tracker))
}

pub async fn create_tracker(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewTracker>,
) -> impl IntoResponse {
    let tracker = state
        .store
        .create_tracker(auth.user_id, &req, Utc::now())
        .await
        .api_err("Failed to create tracker")?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(tracker)))
}

pub async fn update_tracker(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<TrackerPatch>,
) -> impl IntoResponse {
    let id = parse_id(&id, TRACKER_NOT_FOUND)?;

    let tracker = state
        .store
        .update_tracker(id, auth.user_id, &patch)
        .await
        .api_err("Failed to update tracker")?
        .or_not_found(TRACKER_NOT_FOUND)?;

    Ok::<_, ApiError>(Json(tracker))
}

pub async fn delete_tracker(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = parse_id(&id, TRACKER_NOT_FOUND)?;
    let store = state.store.as_ref();

    let tracker = store
        .get_tracker(id, auth.user_id)
        .await
        .api_err("Failed to get tracker")?
        .or_not_found(TRACKER_NOT_FOUND)?;

    store
        .delete_tracker_histories(tracker.id)
        .await
        .api_err("Failed to delete tracker history")?;

    if !store
        .delete_tracker(tracker.id, auth.user_id)
        .await
        .api_err("Failed to delete tracker")?
    {
        return Err(ApiError::not_found(TRACKER_NOT_FOUND));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn list_tracker_history(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = parse_id(&id, TRACKER_NOT_FOUND)?;
    let store = state.store.as_ref();

    let tracker = store
        .get_tracker(id, auth.user_id)
        .await
        .api_err("Failed to get tracker")?
        .or_not_found(TRACKER_NOT_FOUND)?;

    let history = store
        .list_tracker_histories(tracker.id)
        .await
        .api_err("Failed to list tracker history")?;

    Ok::<_, ApiError>(Json(history))
}
