use std::collections::VecDeque;

use async_trait::async_trait;

use super::pool::Pool;
use super::table;
use crate::error::JobError;
use crate::pipeline::{RecordSource, RiverRecord};

/// Record source that reads the destination table back in ascending date
/// order with a single query, then serves the rows forward-only.
///
/// The query is deferred to the first pull, so a step that refuses to start
/// never touches the table.
pub struct TableSource {
    pool: Pool,
    table: String,
    rows: Option<VecDeque<RiverRecord>>,
}

impl TableSource {
    pub fn new(pool: Pool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
            rows: None,
        }
    }
}

#[async_trait]
impl RecordSource for TableSource {
    async fn next(&mut self) -> Result<Option<RiverRecord>, JobError> {
        if self.rows.is_none() {
            let fetched = table::fetch_ordered(&self.pool, &self.table).await?;
            self.rows = Some(fetched.into());
        }
        Ok(self.rows.as_mut().and_then(|rows| rows.pop_front()))
    }
}
