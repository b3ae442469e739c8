//! High-level runner API for the river batch job.
//!
//! This module provides a simplified public interface that encapsulates all
//! the internal wiring: pool and repository setup, the flat-file source, the
//! destination table sink/source, the reducer, and the two-step job.
//!
//! This is the primary API for external users and for the CLI.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use derive_builder::Builder;
use indicatif::{ProgressBar, ProgressStyle};
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::{
    AGGREGATE_CHUNK_SIZE, AGGREGATE_START_LIMIT, AGGREGATE_STEP, LOAD_BATCH_SIZE, LOAD_STEP,
    TABLE_NAME,
};
use crate::db::{self, TableSink, TableSource};
use crate::flatfile::{DelimitedConfig, FlatFileSource};
use crate::io::LocalFileByteReader;
use crate::pipeline::{Job, LocalJobRepository, Step, StepConfig};
use crate::reducer::MaxHeightSink;
use crate::telemetry::{ProgressStats, StepEvent};

pub use crate::pipeline::JobState;

/// Arguments for running the two-step job
#[derive(Debug, Clone, Builder)]
pub struct RunArgs {
    /// Path to the pipe-delimited input file
    #[builder(setter(into))]
    pub source_path: PathBuf,

    /// Database URL (postgres://... or sqlite:...)
    #[builder(setter(into), default = "\"sqlite::memory:\".to_string()")]
    pub database_url: String,

    /// Destination table name
    #[builder(setter(into), default = "TABLE_NAME.to_string()")]
    pub table: String,

    /// Records per bulk insert during the load step
    #[builder(default = "LOAD_BATCH_SIZE")]
    pub load_batch_size: usize,

    /// Records per reducer chunk during the aggregate step
    #[builder(default = "AGGREGATE_CHUNK_SIZE")]
    pub aggregate_chunk_size: usize,

    /// Times the aggregate step may start for one job instance
    #[builder(default = "AGGREGATE_START_LIMIT")]
    pub aggregate_start_limit: u32,

    /// Job instance to resume; a fresh UUID instance is used when absent
    #[builder(default)]
    pub job_id: Option<String>,

    /// Directory for job instance bookkeeping; a temp directory when absent
    #[builder(default)]
    pub state_dir: Option<PathBuf>,

    /// Quiet mode - no progress bar
    #[builder(default)]
    pub quiet: bool,
}

/// Result of a completed job run
#[derive(Debug)]
pub struct JobSummary {
    pub job_id: String,
    pub final_state: JobState,
    pub records_loaded: u64,
    pub records_aggregated: u64,
    pub max_height: f64,
    pub duration: Duration,
}

/// Run the two-step job with the specified arguments
///
/// This is the main entry point. It handles all the internal setup:
/// - Creating the connection pool and the destination table
/// - Setting up the flat-file source over the input path
/// - Creating the job repository for instance bookkeeping
/// - Running the load step to completion, then the aggregate step
///
/// # Example
///
/// ```no_run
/// use riverbatch::runner::{RunArgsBuilder, run_job};
///
/// # async fn example() -> anyhow::Result<()> {
/// let args = RunArgsBuilder::default()
///     .source_path("riverdata.psv")
///     .database_url("sqlite://river.db")
///     .quiet(true)
///     .build()?;
///
/// let summary = run_job(args).await?;
/// println!("max height over {} rows: {}", summary.records_loaded, summary.max_height);
/// # Ok(())
/// # }
/// ```
pub async fn run_job(args: RunArgs) -> Result<JobSummary> {
    let start = Instant::now();

    // Job instance bookkeeping lives under state_dir (temp dir if absent).
    // The TempDir guard must outlive the run.
    let (_state_tmp, state_dir) = match args.state_dir {
        Some(dir) => (None, dir),
        None => {
            let tmp = TempDir::new()?;
            let path = tmp.path().to_path_buf();
            (Some(tmp), path)
        }
    };
    let repository = LocalJobRepository::new(state_dir);

    let job_id = args.job_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    let pool_args = db::PoolArgsBuilder::default()
        .url(args.database_url.clone())
        .build()
        .map_err(|err| anyhow::anyhow!("invalid pool arguments: {err}"))?;
    let pool = db::pool::pool(pool_args)
        .await
        .context("Failed to create database pool")?;

    db::table::ensure_table(&pool, &args.table)
        .await
        .context("Failed to prepare destination table")?;

    // Stage wiring: flat file -> table, then table -> reducer.
    let byte_reader = LocalFileByteReader::new(&args.source_path);
    let mut load_source = FlatFileSource::new(byte_reader, DelimitedConfig::default());
    let estimated_records = load_source.estimate_records().await.unwrap_or(None);
    let mut load_sink = TableSink::new(pool.clone(), args.table.clone());
    let mut aggregate_source = TableSource::new(pool.clone(), args.table.clone());
    let mut aggregate_sink = MaxHeightSink::new();

    let job = Job::new(
        Step::new(StepConfig::new(LOAD_STEP, args.load_batch_size)),
        Step::new(
            StepConfig::new(AGGREGATE_STEP, args.aggregate_chunk_size)
                .with_start_limit(args.aggregate_start_limit),
        ),
    );

    let (telemetry_tx, telemetry_rx) = mpsc::unbounded_channel::<StepEvent>();
    let progress_jh = spawn_progress_task(args.quiet, estimated_records, telemetry_rx);

    let outcome = job
        .run(
            &repository,
            &job_id,
            &mut load_source,
            &mut load_sink,
            &mut aggregate_source,
            &mut aggregate_sink,
            &telemetry_tx,
        )
        .await;

    // Close the channel so the progress task drains and finishes before the
    // summary is printed.
    drop(telemetry_tx);
    if let Some(jh) = progress_jh {
        let _ = jh.await;
    }

    let outcome = outcome.with_context(|| format!("Job {job_id} failed"))?;

    Ok(JobSummary {
        job_id,
        final_state: outcome.final_state,
        records_loaded: outcome.records_loaded,
        records_aggregated: outcome.records_aggregated,
        max_height: aggregate_sink.max_height(),
        duration: start.elapsed(),
    })
}

/// Spawn the task folding step events into progress output. The bar tracks
/// the load step only; its length is the estimated input record count.
fn spawn_progress_task(
    quiet: bool,
    estimated_records: Option<u64>,
    mut telemetry_rx: mpsc::UnboundedReceiver<StepEvent>,
) -> Option<tokio::task::JoinHandle<ProgressStats>> {
    if quiet {
        return None;
    }

    let bar = estimated_records.filter(|&records| records > 0).map(|records| {
        let bar = ProgressBar::new(records);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] Records: [{bar:30.green/blue}] {pos}/{len} ({percent}%)")
                .unwrap()
                .progress_chars("=>-"),
        );
        bar
    });

    Some(tokio::spawn(async move {
        let mut stats = ProgressStats::new();
        let mut load_done = false;

        while let Some(event) = telemetry_rx.recv().await {
            stats.update(&event);

            match &event {
                StepEvent::ChunkCommitted { step, records } if !load_done && step == LOAD_STEP => {
                    if let Some(ref bar) = bar {
                        bar.inc(*records);
                    }
                }
                StepEvent::StepCompleted { step } if step == LOAD_STEP => {
                    load_done = true;
                    if let Some(ref bar) = bar {
                        bar.finish();
                    }
                }
                _ => {}
            }
        }

        if let Some(bar) = bar {
            if !bar.is_finished() {
                bar.finish();
            }
        }

        stats
    }))
}
