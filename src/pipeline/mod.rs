//! Chunk-oriented pipeline primitives: the record type, source/sink
//! capabilities, step execution, job orchestration, and instance bookkeeping

pub mod job;
pub mod repository;
pub mod step;

pub use job::{Job, JobOutcome, JobState};
pub use repository::{JobInstance, JobRepository, LocalJobRepository};
pub use step::{Step, StepConfig};

use async_trait::async_trait;

use crate::error::JobError;

/// A single river measurement: the date token it was captured under and the
/// measured height. Immutable once created; instantiated transiently per row
/// in each stage and discarded after the stage consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct RiverRecord {
    /// Opaque sort key. Never parsed or validated as a calendar date.
    pub date_captured: String,
    pub height: f64,
}

/// Capability producing a lazy, finite, forward-only sequence of records.
#[async_trait]
pub trait RecordSource: Send {
    /// Produce the next record, or `None` once the sequence is exhausted.
    async fn next(&mut self) -> Result<Option<RiverRecord>, JobError>;
}

/// Capability accepting batches of records.
#[async_trait]
pub trait RecordSink: Send {
    /// Accept one batch. Delivered batches are never larger than the step's
    /// chunk size; the final batch may be smaller.
    async fn write(&mut self, records: &[RiverRecord]) -> Result<(), JobError>;

    /// Called exactly once after the source is exhausted and the last batch
    /// has been written.
    async fn close(&mut self) -> Result<(), JobError> {
        Ok(())
    }
}
