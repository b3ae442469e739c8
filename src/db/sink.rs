use async_trait::async_trait;

use super::pool::Pool;
use super::table;
use crate::error::JobError;
use crate::pipeline::{RecordSink, RiverRecord};

/// Record sink that appends each delivered batch to the destination table as
/// one bulk insert. The step's chunk size is therefore also the insert
/// batch size.
pub struct TableSink {
    pool: Pool,
    table: String,
}

impl TableSink {
    pub fn new(pool: Pool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[async_trait]
impl RecordSink for TableSink {
    async fn write(&mut self, records: &[RiverRecord]) -> Result<(), JobError> {
        table::insert_batch(&self.pool, &self.table, records).await
    }
}
