//! Stateful reducer folding the aggregate step's records into a running
//! maximum height.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::JobError;
use crate::pipeline::{RecordSink, RiverRecord};

/// Record sink tracking the maximum height seen across all chunks of the
/// aggregate step. Produces no downstream records; the final maximum is
/// logged once when the sink closes and is readable afterwards via
/// [`MaxHeightSink::max_height`].
///
/// The running maximum starts at 0.0, so a dataset whose heights are all
/// negative still reports 0.0. Ties leave the maximum unchanged.
pub struct MaxHeightSink {
    max_height: f64,
}

impl MaxHeightSink {
    pub fn new() -> Self {
        Self { max_height: 0.0 }
    }

    pub fn max_height(&self) -> f64 {
        self.max_height
    }
}

impl Default for MaxHeightSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordSink for MaxHeightSink {
    async fn write(&mut self, records: &[RiverRecord]) -> Result<(), JobError> {
        for record in records {
            if record.height > self.max_height {
                self.max_height = record.height;
            }
        }
        debug!(max_height = self.max_height, "running maximum after chunk");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), JobError> {
        info!("max height is {}", self.max_height);
        Ok(())
    }
}
