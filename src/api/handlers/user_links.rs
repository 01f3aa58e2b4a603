//! Handlers for the caller's own links.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::dto::user_links::UserLinkResponse;
use crate::api::middleware::auth::Owner;
use crate::error::AppError;
use crate::state::AppState;

/// Lists the caller's links.
///
/// # Endpoint
///
/// `GET /api/user/urls`
///
/// # Response Codes
///
/// - **200 OK**: `[{ "short_url", "original_url" }]`
/// - **204 No Content**: the caller has no links
pub async fn user_links_handler(
    State(state): State<AppState>,
    Extension(Owner(owner)): Extension<Owner>,
) -> Result<Response, AppError> {
    let links = state
        .link_service
        .user_links(&owner, state.user_links_limit)
        .await?;

    if links.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<UserLinkResponse> = links.into_iter().map(Into::into).collect();
    Ok(Json(body).into_response())
}

/// Queues deletion of the caller's links.
///
/// # Endpoint
///
/// `DELETE /api/user/urls`
///
/// # Request Body
///
/// ```json
/// ["4rSPg8ap", "9dKq2LmZ"]
/// ```
///
/// Answers `202 Accepted` immediately. Codes that are unknown or owned by
/// someone else are skipped silently by the pipeline.
pub async fn delete_user_links_handler(
    State(state): State<AppState>,
    Extension(Owner(owner)): Extension<Owner>,
    Json(codes): Json<Vec<String>>,
) -> StatusCode {
    // Fire and forget: the task keeps running after the handle is dropped
    let _task = state.link_service.delete_links(codes, &owner);
    StatusCode::ACCEPTED
}
