//! Domain layer containing the short link model, the storage contract and the
//! deletion pipeline.
//!
//! # Architecture
//!
//! - [`entities`] - Core data structures
//! - [`repositories`] - The [`repositories::Storage`] trait and its error taxonomy
//! - [`deletion_pipeline`] - Fan-out/fan-in worker pool behind "delete my links"
//!
//! The domain layer has no dependency on the HTTP layer. Storage backends live
//! in [`crate::infrastructure::persistence`].

pub mod deletion_pipeline;
pub mod entities;
pub mod repositories;

pub use deletion_pipeline::{
    DeletionOutcome, DeletionPipeline, DeletionReport, DeletionTask, PipelineConfig,
};
