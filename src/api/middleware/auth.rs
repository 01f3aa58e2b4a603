//! Caller identity middleware.

use axum::{extract::Request, middleware::Next, response::Response};
use serde_json::json;

use crate::error::AppError;

/// Header carrying the authenticated user id, set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity of the caller, inserted into request extensions by [`layer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

/// Requires an `X-User-Id` header and exposes it to handlers as [`Owner`].
///
/// Tokens are validated upstream. This layer only refuses requests that
/// arrive without an identity.
///
/// # Errors
///
/// Returns `401 Unauthorized` if the header is missing, empty or not valid UTF-8.
///
/// # Example
///
/// ```rust,ignore
/// let owned = Router::new()
///     .route("/api/user/urls", get(user_links_handler))
///     .route_layer(middleware::from_fn(auth::layer));
/// ```
pub async fn layer(mut req: Request, next: Next) -> Result<Response, AppError> {
    let owner = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| {
            AppError::unauthorized(
                "Unauthorized",
                json!({ "reason": "X-User-Id header is missing or invalid" }),
            )
        })?;

    req.extensions_mut().insert(Owner(owner));

    Ok(next.run(req).await)
}
