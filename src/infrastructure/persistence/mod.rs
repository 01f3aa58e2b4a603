//! Storage backend implementations.
//!
//! # Backends
//!
//! - [`MemoryStorage`] - In-memory map, optionally persisted to a JSON-lines [`Journal`]
//! - [`PgStorage`] - PostgreSQL via SQLx, with transactional batch writes

pub mod journal;
pub mod memory_storage;
pub mod pg_storage;

pub use journal::Journal;
pub use memory_storage::MemoryStorage;
pub use pg_storage::PgStorage;
