use thiserror::Error;

/// Error taxonomy for the batch job.
///
/// Every variant is fatal to the enclosing job: nothing is caught and
/// recovered locally, the job transitions to `Failed` and the process
/// reports a non-zero completion status.
#[derive(Debug, Error)]
pub enum JobError {
    /// A line of the input file did not yield a well-formed record.
    #[error("line {line}: {message}")]
    Parse { line: u64, message: String },

    /// The destination database rejected a read or write.
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A step was re-invoked beyond its allowed start count for one job
    /// instance.
    #[error("step '{step}' exceeded its start limit of {limit}")]
    StartLimitExceeded { step: String, limit: u32 },

    /// Job instance bookkeeping is missing or corrupt.
    #[error("job state error: {0}")]
    State(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}
