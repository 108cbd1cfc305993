//! Stage progress reporting.

use recon_core::Stage;

pub trait ProgressReporter: Send + Sync {
    fn stage_started(&self, stage: Stage);
    /// `items` is whatever the stage produced: records, clusters, assignments.
    fn stage_finished(&self, stage: Stage, items: usize);
}

/// Reports through `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn stage_started(&self, stage: Stage) {
        tracing::info!(%stage, "stage started");
    }

    fn stage_finished(&self, stage: Stage, items: usize) {
        tracing::info!(%stage, items, "stage finished");
    }
}
