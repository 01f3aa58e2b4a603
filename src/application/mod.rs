//! Application layer services.
//!
//! Services consume the [`crate::domain::repositories::Storage`] trait and give
//! HTTP handlers a small API that speaks [`crate::error::AppError`].
//!
//! - [`services::link_service::LinkService`] - Shortening, redirects, listing and deletion

pub mod services;
