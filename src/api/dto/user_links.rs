//! DTOs for the per-user link endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::entities::ShortLink;

/// One entry of `GET /api/user/urls`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserLinkResponse {
    pub short_url: String,
    pub original_url: String,
}

impl From<ShortLink> for UserLinkResponse {
    fn from(link: ShortLink) -> Self {
        Self {
            short_url: link.short_url,
            original_url: link.original_url,
        }
    }
}
