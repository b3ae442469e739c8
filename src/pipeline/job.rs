use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::repository::JobRepository;
use super::step::Step;
use super::{RecordSink, RecordSource};
use crate::error::JobError;
use crate::telemetry::StepEvent;

/// Pipeline-level state for one job instance.
///
/// Transitions run strictly forward:
/// `NotStarted -> Loading -> LoadComplete -> Aggregating -> Done`,
/// with `Failed` reachable from `Loading` or `Aggregating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    NotStarted,
    Loading,
    LoadComplete,
    Aggregating,
    Done,
    Failed,
}

impl JobState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Loading => write!(f, "loading"),
            Self::LoadComplete => write!(f, "load_complete"),
            Self::Aggregating => write!(f, "aggregating"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of a completed job run.
#[derive(Debug)]
pub struct JobOutcome {
    pub records_loaded: u64,
    pub records_aggregated: u64,
    pub final_state: JobState,
}

/// Two sequential steps joined by a completion barrier: the aggregate step
/// never starts until the load step has terminated successfully. Each state
/// transition is persisted against the job instance before the next phase
/// begins.
pub struct Job {
    load: Step,
    aggregate: Step,
}

impl Job {
    pub fn new(load: Step, aggregate: Step) -> Self {
        Self { load, aggregate }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        repository: &dyn JobRepository,
        job_id: &str,
        load_source: &mut dyn RecordSource,
        load_sink: &mut dyn RecordSink,
        aggregate_source: &mut dyn RecordSource,
        aggregate_sink: &mut dyn RecordSink,
        telemetry: &mpsc::UnboundedSender<StepEvent>,
    ) -> Result<JobOutcome, JobError> {
        repository.get_or_create(job_id).await?;
        info!(job_id, "starting job");

        repository.update_state(job_id, JobState::Loading).await?;
        let records_loaded = match self
            .load
            .run(repository, job_id, load_source, load_sink, telemetry)
            .await
        {
            Ok(count) => count,
            Err(err) => return self.fail(repository, job_id, self.load.name(), err).await,
        };
        repository.update_state(job_id, JobState::LoadComplete).await?;

        // Completion barrier: the load step's writes are fully committed
        // before the table is read back.
        repository.update_state(job_id, JobState::Aggregating).await?;
        let records_aggregated = match self
            .aggregate
            .run(repository, job_id, aggregate_source, aggregate_sink, telemetry)
            .await
        {
            Ok(count) => count,
            Err(err) => {
                return self
                    .fail(repository, job_id, self.aggregate.name(), err)
                    .await;
            }
        };
        repository.update_state(job_id, JobState::Done).await?;

        info!(job_id, records_loaded, records_aggregated, "job complete");
        Ok(JobOutcome {
            records_loaded,
            records_aggregated,
            final_state: JobState::Done,
        })
    }

    async fn fail(
        &self,
        repository: &dyn JobRepository,
        job_id: &str,
        step: &str,
        err: JobError,
    ) -> Result<JobOutcome, JobError> {
        error!(job_id, step, "step failed: {err}");
        if let Err(persist_err) = repository.update_state(job_id, JobState::Failed).await {
            warn!(job_id, "failed to persist job state: {persist_err}");
        }
        Err(err)
    }
}
