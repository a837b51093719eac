use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{
        HeaderValue, StatusCode,
        header::{AUTHORIZATION, COOKIE, WWW_AUTHENTICATE},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::helpers::{TokenExtractionError, extract_bearer_token, extract_cookie_token};
use crate::identity::Identity;
use crate::server::AppState;

/// Extractor that requires a token the identity provider accepts.
pub struct RequireAuth(pub Identity);

/// Extractor that additionally requires a provisioned account for the identity.
pub struct RequireUser {
    pub identity: Identity,
    /// Internal numeric id of the caller's account.
    pub user_id: i64,
}

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    UserNotFound,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "No auth token provided"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid session"),
            AuthError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            AuthError::InternalError => (StatusCode::INTERNAL_SERVER_ERROR, "Server error"),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let identity = extract_and_verify_token(parts, state).await?;
        Ok(RequireAuth(identity))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let identity = extract_and_verify_token(parts, state).await?;

        let user = state
            .store
            .get_user_by_external_id(&identity.id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to resolve user for identity: {e}");
                AuthError::InternalError
            })?
            .ok_or(AuthError::UserNotFound)?;

        Ok(RequireUser {
            identity,
            user_id: user.id,
        })
    }
}

async fn extract_and_verify_token(
    parts: &Parts,
    state: &Arc<AppState>,
) -> Result<Identity, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let bearer = extract_bearer_token(auth_header).map_err(|e| match e {
        TokenExtractionError::InvalidScheme => AuthError::InvalidScheme,
        TokenExtractionError::EmptyToken => AuthError::MissingAuth,
    })?;

    let token = match bearer {
        Some(token) => token,
        None => extract_cookie_token(
            parts
                .headers
                .get_all(COOKIE)
                .iter()
                .filter_map(|h| h.to_str().ok()),
        )
        .ok_or(AuthError::MissingAuth)?,
    };

    state
        .identity
        .verify_token(&token)
        .await
        .map_err(|e| {
            tracing::error!("Identity provider verification failed: {e}");
            AuthError::InternalError
        })?
        .ok_or(AuthError::InvalidToken)
}
