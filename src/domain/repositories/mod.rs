//! Storage trait definitions for the domain layer.
//!
//! The [`Storage`] trait abstracts persistence of short links. Implementations
//! live in `crate::infrastructure::persistence`, and a mock is generated via
//! `mockall` for unit tests.
//!
//! # Testing
//!
//! See integration tests in `tests/storage_*.rs` for usage examples.

pub mod storage;

pub use storage::{Storage, StorageError, StorageResult, UniquenessPolicy};

#[cfg(test)]
pub use storage::MockStorage;
