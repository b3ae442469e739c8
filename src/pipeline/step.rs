use tokio::sync::mpsc;
use tracing::info;

use super::repository::JobRepository;
use super::{RecordSink, RecordSource};
use crate::error::JobError;
use crate::telemetry::StepEvent;

/// Configuration for one chunk-oriented step.
#[derive(Debug, Clone)]
pub struct StepConfig {
    pub name: String,
    /// Records delivered to the sink per write call.
    pub chunk_size: usize,
    /// Times this step may be (re)started for one job instance.
    pub start_limit: u32,
}

impl StepConfig {
    pub fn new(name: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            name: name.into(),
            chunk_size,
            start_limit: u32::MAX,
        }
    }

    pub fn with_start_limit(mut self, start_limit: u32) -> Self {
        self.start_limit = start_limit;
        self
    }
}

/// One discrete phase of the pipeline: drains a source into a sink in
/// chunks, committing each chunk as a unit.
pub struct Step {
    config: StepConfig,
}

impl Step {
    pub fn new(config: StepConfig) -> Self {
        Self { config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Register the start against the job instance, then run the source to
    /// exhaustion, delivering records to the sink in chunks of
    /// `chunk_size`. The sink's `close` hook runs after the final chunk.
    ///
    /// The start is registered before the source is touched, so a step that
    /// has exhausted its start limit never reads its input.
    pub async fn run(
        &self,
        repository: &dyn JobRepository,
        job_id: &str,
        source: &mut dyn RecordSource,
        sink: &mut dyn RecordSink,
        telemetry: &mpsc::UnboundedSender<StepEvent>,
    ) -> Result<u64, JobError> {
        let starts = repository.record_step_start(job_id, &self.config.name).await?;
        if starts > self.config.start_limit {
            return Err(JobError::StartLimitExceeded {
                step: self.config.name.clone(),
                limit: self.config.start_limit,
            });
        }

        info!(step = %self.config.name, start = starts, "step starting");
        let _ = telemetry.send(StepEvent::StepStarted {
            step: self.config.name.clone(),
        });

        let mut processed = 0u64;
        let mut chunk = Vec::with_capacity(self.config.chunk_size);

        while let Some(record) = source.next().await? {
            chunk.push(record);
            if chunk.len() == self.config.chunk_size {
                self.commit_chunk(sink, &mut chunk, telemetry).await?;
                processed += self.config.chunk_size as u64;
            }
        }

        if !chunk.is_empty() {
            processed += chunk.len() as u64;
            self.commit_chunk(sink, &mut chunk, telemetry).await?;
        }

        sink.close().await?;

        info!(step = %self.config.name, records = processed, "step complete");
        let _ = telemetry.send(StepEvent::StepCompleted {
            step: self.config.name.clone(),
        });

        Ok(processed)
    }

    async fn commit_chunk(
        &self,
        sink: &mut dyn RecordSink,
        chunk: &mut Vec<crate::pipeline::RiverRecord>,
        telemetry: &mpsc::UnboundedSender<StepEvent>,
    ) -> Result<(), JobError> {
        sink.write(chunk).await?;
        let _ = telemetry.send(StepEvent::ChunkCommitted {
            step: self.config.name.clone(),
            records: chunk.len() as u64,
        });
        chunk.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    use super::*;
    use crate::pipeline::{LocalJobRepository, RiverRecord};

    struct VecSource {
        records: Vec<RiverRecord>,
    }

    impl VecSource {
        fn of_heights(heights: &[f64]) -> Self {
            let records = heights
                .iter()
                .enumerate()
                .map(|(i, &height)| RiverRecord {
                    date_captured: format!("2017-01-{:02}", i + 1),
                    height,
                })
                .collect();
            Self { records }
        }
    }

    #[async_trait]
    impl RecordSource for VecSource {
        async fn next(&mut self) -> Result<Option<RiverRecord>, JobError> {
            if self.records.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.records.remove(0)))
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        chunk_sizes: Vec<usize>,
        closed: bool,
    }

    #[async_trait]
    impl RecordSink for RecordingSink {
        async fn write(&mut self, records: &[RiverRecord]) -> Result<(), JobError> {
            self.chunk_sizes.push(records.len());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), JobError> {
            self.closed = true;
            Ok(())
        }
    }

    /// Source that must never be read; reports an error if it is.
    struct FailingSource;

    #[async_trait]
    impl RecordSource for FailingSource {
        async fn next(&mut self) -> Result<Option<RiverRecord>, JobError> {
            Err(JobError::State("source was read".to_string()))
        }
    }

    async fn test_repository(dir: &TempDir, job_id: &str) -> LocalJobRepository {
        let repository = LocalJobRepository::new(dir.path().to_path_buf());
        repository.get_or_create(job_id).await.unwrap();
        repository
    }

    #[tokio::test]
    async fn test_chunked_delivery_with_final_partial_chunk() {
        let dir = TempDir::new().unwrap();
        let repository = test_repository(&dir, "job-1").await;
        let (tx, _rx) = mpsc::unbounded_channel();

        let step = Step::new(StepConfig::new("fold", 5));
        let mut source = VecSource::of_heights(&[1.0; 12]);
        let mut sink = RecordingSink::default();

        let processed = step
            .run(&repository, "job-1", &mut source, &mut sink, &tx)
            .await
            .unwrap();

        assert_eq!(processed, 12);
        assert_eq!(sink.chunk_sizes, vec![5, 5, 2]);
        assert!(sink.closed);
    }

    #[tokio::test]
    async fn test_empty_source_still_closes_sink() {
        let dir = TempDir::new().unwrap();
        let repository = test_repository(&dir, "job-2").await;
        let (tx, _rx) = mpsc::unbounded_channel();

        let step = Step::new(StepConfig::new("fold", 5));
        let mut source = VecSource { records: vec![] };
        let mut sink = RecordingSink::default();

        let processed = step
            .run(&repository, "job-2", &mut source, &mut sink, &tx)
            .await
            .unwrap();

        assert_eq!(processed, 0);
        assert!(sink.chunk_sizes.is_empty());
        assert!(sink.closed);
    }

    #[tokio::test]
    async fn test_start_limit_refuses_without_reading_source() {
        let dir = TempDir::new().unwrap();
        let repository = test_repository(&dir, "job-3").await;
        let (tx, _rx) = mpsc::unbounded_channel();

        let step = Step::new(StepConfig::new("fold", 5).with_start_limit(3));

        for _ in 0..3 {
            let mut source = VecSource { records: vec![] };
            let mut sink = RecordingSink::default();
            step.run(&repository, "job-3", &mut source, &mut sink, &tx)
                .await
                .unwrap();
        }

        // Fourth start must be refused before the source is touched.
        let mut source = FailingSource;
        let mut sink = RecordingSink::default();
        let err = step
            .run(&repository, "job-3", &mut source, &mut sink, &tx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            JobError::StartLimitExceeded { step: ref name, limit: 3 } if name.as_str() == "fold"
        ));
        assert!(sink.chunk_sizes.is_empty());
    }
}
