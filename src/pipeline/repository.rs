use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::job::JobState;
use crate::error::JobError;

/// Durable record of one job instance: its current state and how many times
/// each step has been started. This is the bookkeeping the start-limit check
/// needs across resumed invocations; nothing else is checkpointed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInstance {
    pub job_id: String,
    pub created_at: String, // ISO 8601
    pub state: JobState,
    #[serde(default)]
    pub step_starts: HashMap<String, u32>,
}

/// Trait for job instance bookkeeping.
///
/// Implementations can use the local filesystem, a database, or other
/// storage backends.
#[async_trait::async_trait]
pub trait JobRepository: Send + Sync {
    /// Load the instance for `job_id`, creating a fresh one if absent.
    async fn get_or_create(&self, job_id: &str) -> Result<JobInstance, JobError>;

    /// Persist a state transition for an existing instance.
    async fn update_state(&self, job_id: &str, state: JobState) -> Result<(), JobError>;

    /// Increment and persist the start count for a step, returning the new
    /// count.
    async fn record_step_start(&self, job_id: &str, step: &str) -> Result<u32, JobError>;
}

/// Local filesystem implementation of JobRepository.
///
/// Directory structure:
///   {base_dir}/jobs/{job_id}/instance.json
pub struct LocalJobRepository {
    base_dir: PathBuf,
}

impl LocalJobRepository {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn instance_path(&self, job_id: &str) -> PathBuf {
        self.base_dir.join("jobs").join(job_id).join("instance.json")
    }

    async fn read(&self, job_id: &str) -> Result<Option<JobInstance>, JobError> {
        let path = self.instance_path(job_id);
        match fs::read_to_string(&path).await {
            Ok(contents) => {
                let instance = serde_json::from_str(&contents).map_err(|err| {
                    JobError::State(format!(
                        "corrupt instance file {}: {err}",
                        path.display()
                    ))
                })?;
                Ok(Some(instance))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, instance: &JobInstance) -> Result<(), JobError> {
        let path = self.instance_path(&instance.job_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(instance)
            .map_err(|err| JobError::State(format!("failed to serialize instance: {err}")))?;
        fs::write(&path, json).await?;
        Ok(())
    }

    async fn load_existing(&self, job_id: &str) -> Result<JobInstance, JobError> {
        self.read(job_id)
            .await?
            .ok_or_else(|| JobError::State(format!("unknown job instance: {job_id}")))
    }
}

#[async_trait::async_trait]
impl JobRepository for LocalJobRepository {
    async fn get_or_create(&self, job_id: &str) -> Result<JobInstance, JobError> {
        if let Some(instance) = self.read(job_id).await? {
            return Ok(instance);
        }

        let instance = JobInstance {
            job_id: job_id.to_string(),
            created_at: Utc::now().to_rfc3339(),
            state: JobState::NotStarted,
            step_starts: HashMap::new(),
        };
        self.write(&instance).await?;
        Ok(instance)
    }

    async fn update_state(&self, job_id: &str, state: JobState) -> Result<(), JobError> {
        let mut instance = self.load_existing(job_id).await?;
        instance.state = state;
        self.write(&instance).await
    }

    async fn record_step_start(&self, job_id: &str, step: &str) -> Result<u32, JobError> {
        let mut instance = self.load_existing(job_id).await?;
        let count = instance
            .step_starts
            .entry(step.to_string())
            .and_modify(|count| *count += 1)
            .or_insert(1);
        let count = *count;
        self.write(&instance).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_fresh_instance_starts_clean() {
        let dir = TempDir::new().unwrap();
        let repository = LocalJobRepository::new(dir.path().to_path_buf());

        let instance = repository.get_or_create("job-a").await.unwrap();
        assert_eq!(instance.job_id, "job-a");
        assert_eq!(instance.state, JobState::NotStarted);
        assert!(instance.step_starts.is_empty());
    }

    #[tokio::test]
    async fn test_state_and_starts_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let repository = LocalJobRepository::new(dir.path().to_path_buf());
            repository.get_or_create("job-b").await.unwrap();
            repository
                .update_state("job-b", JobState::LoadComplete)
                .await
                .unwrap();
            assert_eq!(repository.record_step_start("job-b", "fold").await.unwrap(), 1);
            assert_eq!(repository.record_step_start("job-b", "fold").await.unwrap(), 2);
        }

        // A new repository over the same directory sees the same instance.
        let repository = LocalJobRepository::new(dir.path().to_path_buf());
        let instance = repository.get_or_create("job-b").await.unwrap();
        assert_eq!(instance.state, JobState::LoadComplete);
        assert_eq!(instance.step_starts.get("fold"), Some(&2));
    }

    #[tokio::test]
    async fn test_update_unknown_instance_is_an_error() {
        let dir = TempDir::new().unwrap();
        let repository = LocalJobRepository::new(dir.path().to_path_buf());

        let err = repository
            .update_state("missing", JobState::Loading)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::State(_)));
    }
}
