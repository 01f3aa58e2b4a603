//! Helpers shared across layers.
//!
//! - [`code_generator`] - Random short code generation
//! - [`db_error`] - Mapping of SQLx errors onto [`crate::domain::repositories::StorageError`]

pub mod code_generator;
pub mod db_error;
