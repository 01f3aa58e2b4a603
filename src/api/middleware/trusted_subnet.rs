//! Access guard for internal endpoints.

use std::net::IpAddr;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use ipnet::IpNet;
use serde_json::json;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the client address, set by the fronting proxy.
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Address of the client as reported in `X-Real-IP`.
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(REAL_IP_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// True when `ip` is inside `subnet`. No subnet trusts nobody.
pub fn is_trusted(subnet: Option<&IpNet>, ip: Option<IpAddr>) -> bool {
    match (subnet, ip) {
        (Some(subnet), Some(ip)) => subnet.contains(&ip),
        _ => false,
    }
}

/// Lets a request through only if its `X-Real-IP` lies in the trusted subnet.
///
/// # Errors
///
/// Returns `403 Forbidden` if no subnet is configured, the header is missing
/// or unparsable, or the address is outside the subnet.
pub async fn layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(req.headers());

    if !is_trusted(state.trusted_subnet.as_ref(), ip) {
        tracing::debug!(ip = ?ip, "Internal route refused");
        return Err(AppError::forbidden(
            "Forbidden",
            json!({ "reason": "Client is outside the trusted subnet" }),
        ));
    }

    Ok(next.run(req).await)
}
