/// Telemetry events sent from steps to the runner for progress tracking
#[derive(Debug, Clone)]
pub enum StepEvent {
    /// A step began executing
    StepStarted { step: String },
    /// One chunk was delivered to the sink and committed
    ChunkCommitted { step: String, records: u64 },
    /// A step ran its source to exhaustion and closed its sink
    StepCompleted { step: String },
}

/// Statistics aggregated from step events
#[derive(Debug, Default, Clone)]
pub struct ProgressStats {
    pub steps_started: usize,
    pub steps_completed: usize,
    pub chunks_committed: usize,
    pub records_processed: u64,
}

impl ProgressStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a step event
    pub fn update(&mut self, event: &StepEvent) {
        match event {
            StepEvent::StepStarted { .. } => {
                self.steps_started += 1;
            }
            StepEvent::ChunkCommitted { records, .. } => {
                self.chunks_committed += 1;
                self.records_processed += records;
            }
            StepEvent::StepCompleted { .. } => {
                self.steps_completed += 1;
            }
        }
    }
}
