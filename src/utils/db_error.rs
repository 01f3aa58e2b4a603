use crate::domain::entities::ShortLink;
use crate::domain::repositories::StorageError;

/// Name prefix shared by the unique indexes on `short_links.original_url`.
pub const ORIGINAL_URL_INDEX_PREFIX: &str = "short_links_original_url";

/// Primary key constraint of `short_links`.
pub const PRIMARY_KEY: &str = "short_links_pkey";

/// Returns the violated constraint name if `e` is a unique violation.
pub fn unique_violation_constraint(e: &sqlx::Error) -> Option<String> {
    let db_err = e.as_database_error()?;

    if !db_err.is_unique_violation() {
        return None;
    }

    Some(db_err.constraint().unwrap_or_default().to_string())
}

/// Translates an error from writing `link` into the storage taxonomy.
///
/// A violation of the original URL index is a [`StorageError::Conflict`],
/// of the primary key a [`StorageError::DuplicateId`]. Any other unique
/// violation means the code (or the short URL derived from it) is taken.
pub fn map_write_error(e: sqlx::Error, link: &ShortLink) -> StorageError {
    match unique_violation_constraint(&e) {
        Some(constraint) => classify_violation(&constraint, link),
        None => StorageError::Database(e),
    }
}

fn classify_violation(constraint: &str, link: &ShortLink) -> StorageError {
    if constraint.starts_with(ORIGINAL_URL_INDEX_PREFIX) {
        StorageError::Conflict {
            original_url: link.original_url.clone(),
        }
    } else if constraint == PRIMARY_KEY {
        StorageError::DuplicateId { id: link.id }
    } else {
        StorageError::DuplicateCode {
            code: link.code.clone(),
        }
    }
}
