mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{fast_pipeline, link, wait_until_deleted};
use shortlink::domain::entities::{ShortLink, StoreStats};
use shortlink::domain::repositories::{Storage, StorageResult, UniquenessPolicy};
use shortlink::domain::{DeletionOutcome, DeletionPipeline, PipelineConfig};
use shortlink::infrastructure::persistence::MemoryStorage;
use uuid::Uuid;

/// Memory storage that records every flush and can slow down lookups.
struct Recording {
    inner: MemoryStorage,
    lookup_delay: Duration,
    flushes: Mutex<Vec<Vec<String>>>,
}

impl Recording {
    fn new(lookup_delay: Duration) -> Self {
        Self {
            inner: MemoryStorage::new(UniquenessPolicy::IncludeDeleted),
            lookup_delay,
            flushes: Mutex::new(Vec::new()),
        }
    }

    fn flushed_codes(&self) -> Vec<String> {
        self.flushes.lock().unwrap().concat()
    }
}

#[async_trait]
impl Storage for Recording {
    async fn get_by_code(&self, code: &str) -> StorageResult<ShortLink> {
        if !self.lookup_delay.is_zero() {
            tokio::time::sleep(self.lookup_delay).await;
        }
        self.inner.get_by_code(code).await
    }

    async fn get_by_id(&self, id: Uuid) -> StorageResult<ShortLink> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_original_url(&self, original_url: &str) -> StorageResult<ShortLink> {
        self.inner.get_by_original_url(original_url).await
    }

    async fn list_by_owner(&self, owner: &str, limit: usize) -> StorageResult<Vec<ShortLink>> {
        self.inner.list_by_owner(owner, limit).await
    }

    async fn save(&self, link: ShortLink) -> StorageResult<()> {
        self.inner.save(link).await
    }

    async fn insert_batch(&self, links: Vec<ShortLink>) -> StorageResult<()> {
        self.inner.insert_batch(links).await
    }

    async fn update_batch(&self, links: Vec<ShortLink>) -> StorageResult<()> {
        self.inner.update_batch(links).await
    }

    async fn delete_flag_batch(&self, codes: &[String], owner: &str) -> StorageResult<()> {
        self.flushes.lock().unwrap().push(codes.to_vec());
        self.inner.delete_flag_batch(codes, owner).await
    }

    async fn stats(&self) -> StorageResult<StoreStats> {
        self.inner.stats().await
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

async fn seeded(lookup_delay: Duration) -> Arc<Recording> {
    let storage = Arc::new(Recording::new(lookup_delay));
    storage
        .save(link("alice", "alice001", "http://a1.com"))
        .await
        .unwrap();
    storage
        .save(link("alice", "alice002", "http://a2.com"))
        .await
        .unwrap();
    storage
        .save(link("bob", "bob00001", "http://b1.com"))
        .await
        .unwrap();
    storage
}

fn codes(list: &[&str]) -> Vec<String> {
    list.iter().map(|c| c.to_string()).collect()
}

#[tokio::test]
async fn test_owned_codes_are_eventually_deleted() {
    let storage = seeded(Duration::ZERO).await;
    let pipeline = DeletionPipeline::new(storage.clone(), fast_pipeline());

    let report = pipeline
        .submit(codes(&["alice001", "alice002", "bob00001", "missing0"]), "alice")
        .join()
        .await
        .unwrap();

    assert_eq!(report.outcome, DeletionOutcome::Completed);
    assert_eq!(report.flushed, 2);
    assert!(storage.get_by_code("alice001").await.unwrap().is_deleted());
    assert!(storage.get_by_code("alice002").await.unwrap().is_deleted());
    assert!(!storage.get_by_code("bob00001").await.unwrap().is_deleted());
}

#[tokio::test]
async fn test_foreign_codes_never_reach_storage() {
    let storage = seeded(Duration::ZERO).await;
    let pipeline = DeletionPipeline::new(storage.clone(), fast_pipeline());

    pipeline
        .submit(codes(&["bob00001"]), "alice")
        .join()
        .await
        .unwrap();

    assert!(storage.flushed_codes().is_empty());
    assert!(!storage.get_by_code("bob00001").await.unwrap().is_deleted());
}

#[tokio::test]
async fn test_repeated_codes_are_flushed_once() {
    let storage = seeded(Duration::ZERO).await;
    let pipeline = DeletionPipeline::new(storage.clone(), fast_pipeline());

    let report = pipeline
        .submit(
            codes(&["alice001", "alice001", "alice002", "alice001", "alice002"]),
            "alice",
        )
        .join()
        .await
        .unwrap();

    let flushed = storage.flushed_codes();
    let unique: HashSet<&String> = flushed.iter().collect();

    assert_eq!(report.submitted, 2);
    assert_eq!(flushed.len(), 2);
    assert_eq!(unique.len(), 2);
}

#[tokio::test]
async fn test_already_deleted_codes_are_skipped() {
    let storage = seeded(Duration::ZERO).await;
    storage
        .delete_flag_batch(&codes(&["alice001"]), "alice")
        .await
        .unwrap();
    let pipeline = DeletionPipeline::new(storage.clone(), fast_pipeline());

    let report = pipeline
        .submit(codes(&["alice001", "alice002"]), "alice")
        .join()
        .await
        .unwrap();

    assert_eq!(report.flushed, 1);
}

#[tokio::test]
async fn test_single_worker_processes_everything() {
    let storage = seeded(Duration::ZERO).await;
    let config = PipelineConfig {
        max_workers: 1,
        ..fast_pipeline()
    };
    let pipeline = DeletionPipeline::new(storage.clone(), config);

    let report = pipeline
        .submit(codes(&["alice001", "alice002"]), "alice")
        .join()
        .await
        .unwrap();

    assert_eq!(report.outcome, DeletionOutcome::Completed);
    assert_eq!(report.flushed, 2);
}

#[tokio::test]
async fn test_ticker_flushes_while_work_is_arriving() {
    let storage = Arc::new(Recording::new(Duration::from_millis(60)));
    let all: Vec<String> = (1..=6).map(|n| format!("alice{n:03}")).collect();
    for (n, code) in all.iter().enumerate() {
        storage
            .save(link("alice", code, &format!("http://slow{n}.com")))
            .await
            .unwrap();
    }
    let config = PipelineConfig {
        max_workers: 1,
        flush_interval: Duration::from_millis(100),
        timeout: Duration::from_secs(5),
        ..PipelineConfig::default()
    };
    let pipeline = DeletionPipeline::new(storage.clone(), config);

    let report = pipeline.submit(all.clone(), "alice").join().await.unwrap();

    let batches = storage.flushes.lock().unwrap().clone();
    let flushed = storage.flushed_codes();
    let unique: HashSet<&String> = flushed.iter().collect();

    assert_eq!(report.outcome, DeletionOutcome::Completed);
    assert_eq!(report.flushed, 6);
    assert!(batches.len() > 1, "expected periodic flushes, got {batches:?}");
    assert!(batches.iter().all(|batch| !batch.is_empty()));
    assert_eq!(flushed.len(), 6);
    assert_eq!(unique.len(), 6);
    for code in &all {
        assert!(storage.get_by_code(code).await.unwrap().is_deleted());
    }
}

#[tokio::test]
async fn test_dropped_handle_still_completes() {
    let storage = seeded(Duration::ZERO).await;
    let pipeline = DeletionPipeline::new(storage.clone(), fast_pipeline());

    drop(pipeline.submit(codes(&["alice001"]), "alice"));

    assert!(wait_until_deleted(storage.as_ref(), "alice001").await);
}

#[tokio::test]
async fn test_cancel_drops_unflushed_codes() {
    let storage = seeded(Duration::from_millis(200)).await;
    let config = PipelineConfig {
        flush_interval: Duration::from_secs(60),
        timeout: Duration::from_secs(30),
        ..PipelineConfig::default()
    };
    let pipeline = DeletionPipeline::new(storage.clone(), config);

    let task = pipeline.submit(codes(&["alice001", "alice002"]), "alice");
    task.cancel();
    let report = task.join().await.unwrap();

    assert_eq!(report.outcome, DeletionOutcome::Cancelled);
    assert_eq!(report.flushed, 0);
    assert!(storage.flushed_codes().is_empty());
    assert!(!storage.get_by_code("alice001").await.unwrap().is_deleted());
}

#[tokio::test]
async fn test_deadline_stops_the_run() {
    let storage = seeded(Duration::from_millis(500)).await;
    let config = PipelineConfig {
        flush_interval: Duration::from_secs(60),
        timeout: Duration::from_millis(100),
        ..PipelineConfig::default()
    };
    let pipeline = DeletionPipeline::new(storage.clone(), config);

    let report = pipeline
        .submit(codes(&["alice001", "alice002"]), "alice")
        .join()
        .await
        .unwrap();

    assert_eq!(report.outcome, DeletionOutcome::TimedOut);
    assert!(storage.flushed_codes().is_empty());

    // Workers were told to stop, so nothing lands after the deadline either
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(storage.flushed_codes().is_empty());
}
