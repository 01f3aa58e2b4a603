//! DTO for the internal statistics endpoint.

use serde::{Deserialize, Serialize};

use crate::domain::entities::StoreStats;

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Live (not deleted) links.
    pub urls: i64,
    /// Distinct owners.
    pub users: i64,
}

impl From<StoreStats> for StatsResponse {
    fn from(stats: StoreStats) -> Self {
        Self {
            urls: stats.urls,
            users: stats.users,
        }
    }
}
