use clap::{Parser, Subcommand};
use riverbatch::runner::{RunArgsBuilder, run_job};
use std::path::PathBuf;

#[derive(Parser, Clone)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Subcommand)]
enum Command {
    /// Load the input file into the destination table, then report the
    /// maximum height over all persisted rows
    Run {
        /// Path to the pipe-delimited input file (dateCaptured|height per line)
        #[arg(short, long)]
        source: PathBuf,

        /// Database URL (postgres://... or sqlite:...)
        #[arg(short, long, default_value = "sqlite::memory:")]
        database: String,

        /// Destination table name
        #[arg(short, long, default_value = "riverhistory")]
        table: String,

        /// Records per bulk insert during the load step
        #[arg(long, default_value = "10")]
        load_batch_size: usize,

        /// Records per reducer chunk during the aggregate step
        #[arg(long, default_value = "5")]
        aggregate_chunk_size: usize,

        /// Job instance id to resume (a fresh instance if not specified)
        #[arg(long)]
        job_id: Option<String>,

        /// Directory for job instance bookkeeping (system temp directory if
        /// not specified)
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Quiet mode - minimal output, only show summary
        #[arg(short, long)]
        quiet: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Run {
            source,
            database,
            table,
            load_batch_size,
            aggregate_chunk_size,
            job_id,
            state_dir,
            quiet,
        } => {
            run(
                source,
                database,
                table,
                load_batch_size,
                aggregate_chunk_size,
                job_id,
                state_dir,
                quiet,
            )
            .await?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run(
    source: PathBuf,
    database: String,
    table: String,
    load_batch_size: usize,
    aggregate_chunk_size: usize,
    job_id: Option<String>,
    state_dir: Option<PathBuf>,
    quiet: bool,
) -> anyhow::Result<()> {
    // Initialize tracing based on quiet mode
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let filter = if quiet {
        EnvFilter::new("riverbatch=warn,sqlx=off")
    } else {
        EnvFilter::new("riverbatch=info,sqlx=off")
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    if !quiet {
        println!("River Batch Job");
        println!("===============");
        println!("Source: {}", source.display());
        println!("Database: {}", database);
        println!("Table: {}", table);
        println!();
    }

    let run_args = RunArgsBuilder::default()
        .source_path(source)
        .database_url(database)
        .table(table)
        .load_batch_size(load_batch_size)
        .aggregate_chunk_size(aggregate_chunk_size)
        .job_id(job_id)
        .state_dir(state_dir)
        .quiet(quiet)
        .build()?;

    let summary = run_job(run_args).await?;

    println!();
    println!("Job Summary");
    println!("===========");
    println!("Job ID: {}", summary.job_id);
    println!("Final state: {}", summary.final_state);
    println!("Records loaded: {}", summary.records_loaded);
    println!("Records aggregated: {}", summary.records_aggregated);
    println!("Max height: {}", summary.max_height);
    println!("Duration: {:.2}s", summary.duration.as_secs_f64());

    Ok(())
}
