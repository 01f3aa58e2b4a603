//! Asynchronous batch deletion of short links.
//!
//! A submitted request runs on its own task and goes through four stages:
//!
//! 1. A generator de-duplicates the codes and feeds them into a bounded work channel
//! 2. A pool of workers resolves each code and keeps those the caller owns
//! 3. All workers send into one results channel, which closes when the last worker exits
//! 4. A flush loop buffers results and hands them to [`Storage::delete_flag_batch`] on every tick
//!
//! The whole run shares one deadline. Cancelling or timing out stops every stage,
//! and codes still sitting in the flush buffer are dropped.

use std::collections::{BTreeSet, HashSet};
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::repositories::Storage;

/// Tuning knobs for [`DeletionPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on concurrent lookup workers per request.
    pub max_workers: usize,
    /// Period between flushes to storage.
    pub flush_interval: Duration,
    /// Deadline for the whole run, measured from submission.
    pub timeout: Duration,
    /// Capacity of the work and results channels.
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            flush_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
            channel_capacity: 64,
        }
    }
}

/// How a deletion run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// Every accepted code was flushed (or failed to flush and was logged).
    Completed,
    /// The caller cancelled the run.
    Cancelled,
    /// The deadline passed first.
    TimedOut,
}

/// Summary of a finished run, returned by [`DeletionTask::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub outcome: DeletionOutcome,
    /// Distinct codes in the request.
    pub submitted: usize,
    /// Codes handed to storage in successful flushes.
    pub flushed: usize,
    /// Codes lost to failed flushes or to cancellation.
    pub dropped: usize,
}

/// Handle to a running deletion.
///
/// Dropping the handle leaves the run going in the background.
#[derive(Debug)]
pub struct DeletionTask {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<DeletionReport>,
}

impl DeletionTask {
    /// Asks the run to stop. Flushes that already completed stay applied.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Waits for the run to end.
    pub async fn join(self) -> Result<DeletionReport, JoinError> {
        self.handle.await
    }
}

/// Entry point for "delete my links" requests.
#[derive(Clone)]
pub struct DeletionPipeline {
    storage: Arc<dyn Storage>,
    config: PipelineConfig,
}

impl DeletionPipeline {
    pub fn new(storage: Arc<dyn Storage>, config: PipelineConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Starts deleting `codes` on behalf of `owner` and returns immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, codes: Vec<String>, owner: impl Into<String>) -> DeletionTask {
        let (cancel, cancel_rx) = watch::channel(false);
        let run = Run {
            storage: Arc::clone(&self.storage),
            config: self.config.clone(),
            owner: owner.into(),
            deadline: Instant::now() + self.config.timeout,
        };

        metrics::counter!("deletion_requests_total").increment(1);

        let handle = tokio::spawn(run.execute(codes, cancel_rx));
        DeletionTask { cancel, handle }
    }
}

struct Run {
    storage: Arc<dyn Storage>,
    config: PipelineConfig,
    owner: String,
    deadline: Instant,
}

impl Run {
    async fn execute(
        self,
        codes: Vec<String>,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> DeletionReport {
        let unique = dedupe(codes);
        let mut report = DeletionReport {
            outcome: DeletionOutcome::Completed,
            submitted: unique.len(),
            flushed: 0,
            dropped: 0,
        };

        if unique.is_empty() {
            return report;
        }

        let capacity = self.config.channel_capacity.max(1);
        let (work_tx, work_rx) = mpsc::channel(capacity);
        let (results_tx, mut results_rx) = mpsc::channel(capacity);
        let (stop_tx, stop_rx) = watch::channel(false);

        tokio::spawn(generate(unique, work_tx, stop_rx.clone()));

        let workers = self.config.max_workers.max(1).min(report.submitted);
        let work_rx = Arc::new(Mutex::new(work_rx));
        for worker_id in 0..workers {
            tokio::spawn(resolve_owned(
                worker_id,
                Arc::clone(&self.storage),
                self.owner.clone(),
                Arc::clone(&work_rx),
                results_tx.clone(),
                stop_rx.clone(),
            ));
        }
        drop(results_tx);

        debug!(
            owner = %self.owner,
            codes = report.submitted,
            workers,
            "Deletion run started"
        );

        let mut buffer = BTreeSet::new();
        let mut ticker = tokio::time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately
        ticker.tick().await;

        let deadline = tokio::time::sleep_until(self.deadline);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = cancelled(&mut cancel_rx) => {
                    report.outcome = DeletionOutcome::Cancelled;
                    break;
                }
                _ = &mut deadline => {
                    report.outcome = DeletionOutcome::TimedOut;
                    break;
                }
                _ = ticker.tick() => {
                    self.flush(&mut buffer, &mut report).await;
                }
                received = results_rx.recv() => match received {
                    Some(code) => {
                        buffer.insert(code);
                    }
                    None => {
                        self.flush(&mut buffer, &mut report).await;
                        break;
                    }
                },
            }
        }

        stop_tx.send_replace(true);

        if report.outcome != DeletionOutcome::Completed {
            let lost = buffer.len();
            report.dropped += lost;
            metrics::counter!("deletion_codes_dropped_total").increment(lost as u64);
            warn!(
                owner = %self.owner,
                outcome = ?report.outcome,
                lost,
                "Deletion run stopped before flushing all codes"
            );
        } else {
            info!(
                owner = %self.owner,
                submitted = report.submitted,
                flushed = report.flushed,
                dropped = report.dropped,
                "Deletion run finished"
            );
        }

        report
    }

    async fn flush(&self, buffer: &mut BTreeSet<String>, report: &mut DeletionReport) {
        if buffer.is_empty() {
            return;
        }

        let batch: Vec<String> = std::mem::take(buffer).into_iter().collect();

        match self.storage.delete_flag_batch(&batch, &self.owner).await {
            Ok(()) => {
                report.flushed += batch.len();
                metrics::counter!("deletion_codes_flushed_total").increment(batch.len() as u64);
                debug!(owner = %self.owner, count = batch.len(), "Deletion batch flushed");
            }
            Err(e) => {
                report.dropped += batch.len();
                metrics::counter!("deletion_flush_failures_total").increment(1);
                metrics::counter!("deletion_codes_dropped_total").increment(batch.len() as u64);
                error!(
                    owner = %self.owner,
                    count = batch.len(),
                    error = %e,
                    "Failed to flush deletion batch"
                );
            }
        }
    }
}

/// Keeps the first occurrence of every code.
fn dedupe(codes: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(codes.len());
    codes
        .into_iter()
        .filter(|code| seen.insert(code.clone()))
        .collect()
}

async fn generate(codes: Vec<String>, work_tx: mpsc::Sender<String>, mut stop: watch::Receiver<bool>) {
    for code in codes {
        tokio::select! {
            _ = stopped(&mut stop) => return,
            sent = work_tx.send(code) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

async fn resolve_owned(
    worker_id: usize,
    storage: Arc<dyn Storage>,
    owner: String,
    work_rx: Arc<Mutex<mpsc::Receiver<String>>>,
    results_tx: mpsc::Sender<String>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let code = tokio::select! {
            _ = stopped(&mut stop) => break,
            next = next_code(&work_rx) => match next {
                Some(code) => code,
                None => break,
            },
        };

        match storage.get_by_code(&code).await {
            Ok(link) if link.is_owned_by(&owner) && !link.is_deleted() => {
                if results_tx.send(code).await.is_err() {
                    break;
                }
            }
            Ok(_) => {
                debug!(worker_id, code = %code, "Skipping code not deletable by owner");
            }
            Err(e) => {
                debug!(worker_id, code = %code, error = %e, "Lookup failed, skipping code");
            }
        }
    }
}

async fn next_code(work_rx: &Mutex<mpsc::Receiver<String>>) -> Option<String> {
    work_rx.lock().await.recv().await
}

/// Resolves once the run is told to stop or the run itself is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
}

/// Resolves once the caller cancels. A dropped handle never cancels.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let handle_dropped = cancel.wait_for(|cancel| *cancel).await.is_err();
    if handle_dropped {
        pending::<()>().await;
    }
}
