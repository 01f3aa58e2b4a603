//! Core domain entities.
//!
//! - [`ShortLink`] - A shortened URL mapping with its owner and soft-delete flag
//! - [`StoreStats`] - Service-wide counters reported by storage backends

pub mod short_link;

pub use short_link::{ShortLink, StoreStats, build_short_url};
