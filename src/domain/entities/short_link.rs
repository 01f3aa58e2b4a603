//! Short link entity representing a code → original URL mapping.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A shortened URL owned by a single user.
///
/// The serde names double as the journal format of the file-backed store,
/// one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLink {
    #[serde(rename = "uuid")]
    pub id: Uuid,
    #[serde(rename = "user_id")]
    pub owner: String,
    pub code: String,
    pub short_url: String,
    pub original_url: String,
    #[serde(rename = "is_deleted", default)]
    pub deleted: bool,
}

impl ShortLink {
    /// Creates a new, live short link with a freshly assigned id.
    ///
    /// `short_url` is derived from `base_url` and `code`.
    pub fn new(
        owner: impl Into<String>,
        code: impl Into<String>,
        base_url: &str,
        original_url: impl Into<String>,
    ) -> Self {
        let code = code.into();
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            short_url: build_short_url(base_url, &code),
            code,
            original_url: original_url.into(),
            deleted: false,
        }
    }

    /// Returns true if the owner has marked the link as deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Returns true if `owner` is the user who created the link.
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner == owner
    }
}

/// Joins the service base URL and a code into a public short URL.
pub fn build_short_url(base_url: &str, code: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), code)
}

/// Aggregate counters exposed by the storage layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of live (not deleted) links.
    pub urls: i64,
    /// Number of distinct owners.
    pub users: i64,
}
