//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /{code}`  - Short link redirect (public)
//! - `GET  /ping`, `/api/health` - Public service endpoints
//! - `GET  /api/internal/stats` - Trusted subnet only
//! - everything else - Requires the `X-User-Id` header
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Identity** - `X-User-Id` header on owner routes
//! - **Trusted subnet** - `X-Real-IP` check on internal routes
//! - **Path normalization** - Trailing slash handling

use axum::Router;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

use crate::api;
use crate::api::handlers::redirect_handler;
use crate::api::middleware::tracing;
use crate::state::AppState;

/// Constructs the application router with all routes and middleware.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// All routes with state and tracing applied, without path normalization.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/{code}", get(redirect_handler))
        .merge(api::routes::public_routes())
        .merge(api::routes::owner_routes())
        .merge(api::routes::internal_routes(state.clone()))
        .with_state(state)
        .layer(tracing::layer())
}
