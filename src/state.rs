//! Shared state injected into every handler.

use std::sync::Arc;

use ipnet::IpNet;

use crate::application::services::LinkService;

#[derive(Clone)]
pub struct AppState {
    pub link_service: Arc<LinkService>,
    /// Upper bound on links returned by `GET /api/user/urls`.
    pub user_links_limit: usize,
    /// Clients allowed on internal routes. `None` closes them.
    pub trusted_subnet: Option<IpNet>,
}

impl AppState {
    pub fn new(link_service: Arc<LinkService>, user_links_limit: usize) -> Self {
        Self {
            link_service,
            user_links_limit,
            trusted_subnet: None,
        }
    }

    pub fn with_trusted_subnet(mut self, subnet: Option<IpNet>) -> Self {
        self.trusted_subnet = subnet;
        self
    }
}
