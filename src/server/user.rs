use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_user).post(create_user).delete(delete_user))
}

pub async fn get_user(
    RequireAuth(identity): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let user = state
        .store
        .get_user_by_external_id(&identity.id)
        .await
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    Ok::<_, ApiError>(Json(user))
}

/// Provisions the caller's account. Repeated calls return the existing row.
pub async fn create_user(
    RequireAuth(identity): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    if let Some(existing) = store
        .get_user_by_external_id(&identity.id)
        .await
        .api_err("Failed to check existing user")?
    {
        return Ok((StatusCode::OK, Json(existing)));
    }

    let user = store
        .create_user(&identity.id, identity.email.as_deref())
        .await
        .api_err("Failed to create user")?;

    tracing::info!("Provisioned user {}", user.id);

    Ok::<_, ApiError>((StatusCode::CREATED, Json(user)))
}

/// Removes the caller's histories, trackers and account row, in that order,
/// then asks the identity provider to drop the account. The provider step is
/// best-effort: its failure is logged and the response is still 204.
pub async fn delete_user(
    RequireAuth(identity): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let user = store
        .get_user_by_external_id(&identity.id)
        .await
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    let histories = store
        .delete_user_histories(user.id)
        .await
        .api_err("Failed to delete user histories")?;

    let trackers = store
        .delete_user_trackers(user.id)
        .await
        .api_err("Failed to delete user trackers")?;

    store
        .delete_user(user.id)
        .await
        .api_err("Failed to delete user")?;

    tracing::info!(
        "Deleted user {} ({} trackers, {} histories)",
        user.id,
        trackers,
        histories
    );

    if let Some(external_id) = user.user_id.as_deref() {
        if let Err(e) = state.identity.delete_account(external_id).await {
            tracing::warn!("Failed to delete identity account for user {}: {e}", user.id);
        }
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
