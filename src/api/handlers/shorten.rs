//! Handlers for link shortening.

use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;
use validator::{Validate, ValidateUrl};

use crate::api::dto::shorten::{
    BatchShortenItem, BatchShortenResult, ShortenRequest, ShortenResponse,
};
use crate::api::middleware::auth::Owner;
use crate::error::AppError;
use crate::state::AppState;

/// Shortens a URL sent as plain text.
///
/// # Endpoint
///
/// `POST /`
///
/// # Response Codes
///
/// - **201 Created**: new link, body is the short URL
/// - **409 Conflict**: URL already shortened, body is the existing short URL
/// - **400 Bad Request**: body is not a URL
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    Extension(Owner(owner)): Extension<Owner>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let url = body.trim();
    if !url.validate_url() {
        return Err(AppError::bad_request(
            "Invalid URL format",
            json!({ "url": url }),
        ));
    }

    let shortened = state.link_service.shorten(url, &owner).await?;

    Ok((
        status_for(shortened.created),
        [(header::CONTENT_TYPE, "text/plain")],
        shortened.link.short_url,
    ))
}

/// Shortens a URL sent as JSON.
///
/// # Endpoint
///
/// `POST /api/shorten`
///
/// # Request Body
///
/// ```json
/// { "url": "https://example.com" }
/// ```
///
/// # Response
///
/// ```json
/// { "result": "http://localhost:8080/4rSPg8ap" }
/// ```
///
/// Returns 201 for a new link and 409 with the existing short URL when the
/// URL was already shortened.
pub async fn shorten_handler(
    State(state): State<AppState>,
    Extension(Owner(owner)): Extension<Owner>,
    Json(payload): Json<ShortenRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let shortened = state.link_service.shorten(&payload.url, &owner).await?;

    Ok((
        status_for(shortened.created),
        Json(ShortenResponse {
            result: shortened.link.short_url,
        }),
    ))
}

/// Shortens several URLs in one request.
///
/// # Endpoint
///
/// `POST /api/shorten/batch`
///
/// # Request Body
///
/// ```json
/// [{ "correlation_id": "1", "original_url": "https://example.com" }]
/// ```
///
/// # Response
///
/// `201 Created` with `[{ "correlation_id": "1", "short_url": "..." }]` in
/// request order. The batch is rejected as a whole on any invalid entry or
/// already shortened URL.
pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    Extension(Owner(owner)): Extension<Owner>,
    Json(payload): Json<Vec<BatchShortenItem>>,
) -> Result<impl IntoResponse, AppError> {
    for item in &payload {
        item.validate()?;
    }

    let results = state
        .link_service
        .shorten_batch(payload.into_iter().map(Into::into).collect(), &owner)
        .await?;

    let body: Vec<BatchShortenResult> = results
        .into_iter()
        .map(|(correlation_id, link)| BatchShortenResult {
            correlation_id,
            short_url: link.short_url,
        })
        .collect();

    Ok((StatusCode::CREATED, Json(body)))
}

fn status_for(created: bool) -> StatusCode {
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    }
}
