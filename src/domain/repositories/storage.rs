//! Storage contract shared by the file-backed and PostgreSQL backends.

use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{ShortLink, StoreStats};

/// Errors returned by [`Storage`] implementations.
///
/// [`StorageError::NotFound`] and [`StorageError::Conflict`] are expected
/// outcomes that callers branch on. Everything else is a backend failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short link not found")]
    NotFound,

    /// The original URL is already shortened. The caller should fetch the
    /// existing record with [`Storage::get_by_original_url`].
    #[error("original url already shortened: {original_url}")]
    Conflict { original_url: String },

    /// The generated code is taken. The caller should retry with a new code.
    #[error("short code already in use: {code}")]
    DuplicateCode { code: String },

    /// A record with this id already exists. Ids are never reused.
    #[error("short link id already in use: {id}")]
    DuplicateId { id: Uuid },

    #[error("journal i/o failed: {0}")]
    Journal(#[from] std::io::Error),

    #[error("journal line {line} is malformed: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize short link: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Whether soft-deleted links still reserve their original URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UniquenessPolicy {
    /// Every stored link, deleted or not, blocks a second link for its URL.
    #[default]
    IncludeDeleted,
    /// Only live links block a second link for their URL.
    LiveOnly,
}

impl UniquenessPolicy {
    /// Returns true if `link` takes part in the original URL uniqueness check.
    pub fn reserves_url(self, link: &ShortLink) -> bool {
        match self {
            Self::IncludeDeleted => true,
            Self::LiveOnly => !link.deleted,
        }
    }
}

impl FromStr for UniquenessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" | "include_deleted" => Ok(Self::IncludeDeleted),
            "live" | "live_only" => Ok(Self::LiveOnly),
            other => Err(format!("unknown uniqueness policy '{other}'")),
        }
    }
}

/// Storage interface for short links.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::MemoryStorage`] - In-memory map with a JSON-lines journal
/// - [`crate::infrastructure::persistence::PgStorage`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
///
/// # Consistency
///
/// - `original_url` is unique according to the backend's [`UniquenessPolicy`]
/// - `code` is unique and never reused
/// - `id` is unique
/// - Batch operations are all-or-nothing
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Finds a link by its short code, deleted or not.
    async fn get_by_code(&self, code: &str) -> StorageResult<ShortLink>;

    /// Finds a link by its id.
    async fn get_by_id(&self, id: Uuid) -> StorageResult<ShortLink>;

    /// Finds the link that currently reserves `original_url`.
    async fn get_by_original_url(&self, original_url: &str) -> StorageResult<ShortLink>;

    /// Lists up to `limit` links created by `owner`, in no particular order.
    async fn list_by_owner(&self, owner: &str, limit: usize) -> StorageResult<Vec<ShortLink>>;

    /// Stores a single new link.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Conflict`] if the original URL is already reserved
    /// - [`StorageError::DuplicateCode`] if the code is taken
    /// - [`StorageError::DuplicateId`] if the id is taken
    async fn save(&self, link: ShortLink) -> StorageResult<()>;

    /// Stores several new links at once. Nothing is stored if any link fails.
    async fn insert_batch(&self, links: Vec<ShortLink>) -> StorageResult<()>;

    /// Replaces `original_url` and ORs `deleted` on existing links, matched by id.
    ///
    /// Nothing is changed if any link is unknown or would violate uniqueness.
    async fn update_batch(&self, links: Vec<ShortLink>) -> StorageResult<()>;

    /// Marks every link in `codes` that belongs to `owner` as deleted.
    ///
    /// Unknown codes and codes owned by someone else are skipped silently.
    async fn delete_flag_batch(&self, codes: &[String], owner: &str) -> StorageResult<()>;

    /// Counts live links and distinct owners.
    async fn stats(&self) -> StorageResult<StoreStats>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> StorageResult<()>;

    /// Releases backend resources.
    async fn close(&self) -> StorageResult<()>;
}
