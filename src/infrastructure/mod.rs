//! Infrastructure layer for external integrations.
//!
//! This layer implements the [`Storage`] trait defined by the domain layer.
//!
//! # Modules
//!
//! - [`persistence`] - Memory/journal and PostgreSQL backends

pub mod persistence;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::Config;
use crate::domain::repositories::{Storage, StorageResult};
use persistence::{MemoryStorage, PgStorage};

/// Builds the storage backend selected by `config`.
///
/// # Errors
///
/// Returns an error if the database is unreachable, migrations fail, or the
/// journal cannot be loaded.
pub async fn connect_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let policy = config.unique_url_policy;

    if let Some(database_url) = &config.database_url {
        let storage = PgStorage::connect(
            database_url,
            config.db_max_connections,
            Duration::from_secs(config.db_connect_timeout),
            policy,
        )
        .await?;
        info!("Storage: PostgreSQL");
        return Ok(Arc::new(storage));
    }

    match &config.file_storage_path {
        Some(path) => {
            let storage = MemoryStorage::open(path, policy).await?;
            info!(path = %path.display(), "Storage: file journal");
            Ok(Arc::new(storage))
        }
        None => {
            info!("Storage: memory only");
            Ok(Arc::new(MemoryStorage::new(policy)))
        }
    }
}
