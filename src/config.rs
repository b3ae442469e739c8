//! Configuration constants for the batch job
//!
//! This module centralizes all tunable parameters and fixed identifiers used
//! throughout the application.

// ============================================================================
// Destination table
// ============================================================================

/// Destination table name.
pub const TABLE_NAME: &str = "riverhistory";

/// Column holding the date token. Used only as the sort key for the
/// aggregation read; never parsed as a calendar date.
pub const DATE_COLUMN: &str = "dateCaptured";

/// Column holding the measured height.
pub const HEIGHT_COLUMN: &str = "height";

// ============================================================================
// Step configuration
// ============================================================================

/// Name of the file-to-table load step.
pub const LOAD_STEP: &str = "load";

/// Name of the table-to-reducer aggregate step.
pub const AGGREGATE_STEP: &str = "aggregate";

/// Records per bulk insert during the load step. Each full batch is
/// flushed as one multi-row INSERT.
pub const LOAD_BATCH_SIZE: usize = 10;

/// Records per reducer chunk during the aggregate step.
pub const AGGREGATE_CHUNK_SIZE: usize = 5;

/// Times the aggregate step may be started for one job instance before it
/// refuses to run again.
pub const AGGREGATE_START_LIMIT: u32 = 3;

// ============================================================================
// I/O configuration
// ============================================================================

/// Size of line-aligned segments when streaming the input file.
///
/// Set to 8KB (standard memory page size) for efficient I/O operations.
/// This aligns with OS-level buffering and provides good balance between
/// memory usage and throughput for streaming file reads.
pub const SEGMENT_SIZE: usize = 8192; // 8 KB

/// Size of the sample read when estimating the input's record count.
///
/// 8KB typically captures hundreds of rows, enough for a stable estimate
/// without reading a large portion of the file.
pub const SAMPLE_SIZE: usize = 8192; // 8 KB
