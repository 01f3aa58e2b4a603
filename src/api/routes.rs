//! API route configuration.

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::api::handlers::{
    delete_user_links_handler, health_handler, ping_handler, shorten_batch_handler,
    shorten_handler, shorten_text_handler, stats_handler, user_links_handler,
};
use crate::api::middleware::{auth, trusted_subnet};
use crate::state::AppState;

/// Routes acting on behalf of a user, guarded by [`auth::layer`].
///
/// # Endpoints
///
/// - `POST   /`                   - Shorten a plain-text URL
/// - `POST   /api/shorten`        - Shorten a JSON URL
/// - `POST   /api/shorten/batch`  - Shorten several URLs
/// - `GET    /api/user/urls`      - List the caller's links
/// - `DELETE /api/user/urls`      - Queue deletion of the caller's links
pub fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(shorten_text_handler))
        .route("/api/shorten", post(shorten_handler))
        .route("/api/shorten/batch", post(shorten_batch_handler))
        .route(
            "/api/user/urls",
            get(user_links_handler).delete(delete_user_links_handler),
        )
        .route_layer(middleware::from_fn(auth::layer))
}

/// Routes that need no identity.
///
/// # Endpoints
///
/// - `GET /ping`               - Storage liveness
/// - `GET /api/health`         - Component health report
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/api/health", get(health_handler))
}

/// Routes restricted to the trusted subnet, guarded by [`trusted_subnet::layer`].
///
/// # Endpoints
///
/// - `GET /api/internal/stats` - Link and user counters
pub fn internal_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/internal/stats", get(stats_handler))
        .route_layer(middleware::from_fn_with_state(state, trusted_subnet::layer))
}
