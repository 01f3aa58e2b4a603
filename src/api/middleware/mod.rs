//! HTTP middleware for request processing.
//!
//! Provides caller identity, trusted subnet and observability middleware.

pub mod auth;
pub mod tracing;
pub mod trusted_subnet;
