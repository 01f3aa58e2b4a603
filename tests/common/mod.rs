#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use shortlink::application::services::LinkService;
use shortlink::domain::entities::ShortLink;
use shortlink::domain::repositories::{Storage, UniquenessPolicy};
use shortlink::domain::{DeletionPipeline, PipelineConfig};
use shortlink::infrastructure::persistence::MemoryStorage;
use shortlink::routes::router;
use shortlink::state::AppState;

pub const BASE_URL: &str = "http://localhost:8080";
pub const USER_HEADER: &str = "X-User-Id";
pub const REAL_IP_HEADER: &str = "X-Real-IP";
pub const TRUSTED_SUBNET: &str = "10.0.0.0/8";

/// Pipeline settings short enough for tests to observe flushes quickly.
pub fn fast_pipeline() -> PipelineConfig {
    PipelineConfig {
        flush_interval: Duration::from_millis(20),
        timeout: Duration::from_secs(5),
        ..PipelineConfig::default()
    }
}

pub fn link(owner: &str, code: &str, url: &str) -> ShortLink {
    ShortLink::new(owner, code, BASE_URL, url)
}

pub fn memory_storage() -> Arc<dyn Storage> {
    Arc::new(MemoryStorage::new(UniquenessPolicy::IncludeDeleted))
}

pub fn create_test_state(storage: Arc<dyn Storage>) -> AppState {
    let pipeline = DeletionPipeline::new(Arc::clone(&storage), fast_pipeline());
    let link_service = Arc::new(LinkService::new(storage, pipeline, BASE_URL));
    AppState::new(link_service, 100)
}

/// Test server over the full router with an empty memory store.
pub fn create_test_server() -> (TestServer, Arc<dyn Storage>) {
    let storage = memory_storage();
    let server = TestServer::new(router(create_test_state(Arc::clone(&storage)))).unwrap();
    (server, storage)
}

/// Like [`create_test_server`], with internal routes open to [`TRUSTED_SUBNET`].
pub fn create_trusted_test_server() -> (TestServer, Arc<dyn Storage>) {
    let storage = memory_storage();
    let state = create_test_state(Arc::clone(&storage))
        .with_trusted_subnet(Some(TRUSTED_SUBNET.parse().unwrap()));
    let server = TestServer::new(router(state)).unwrap();
    (server, storage)
}

/// Polls until `code` is flagged deleted or the wait runs out.
pub async fn wait_until_deleted(storage: &dyn Storage, code: &str) -> bool {
    for _ in 0..100 {
        if storage.get_by_code(code).await.unwrap().is_deleted() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
