//! End-to-end counterparty reconciliation: load, canonicalize, cluster,
//! annotate, match to the canonical group list, write.

pub mod io;
pub mod pipeline;
pub mod progress;
pub mod report;

pub use pipeline::{Canonicalized, ReconPipeline, GROUP_FIELD};
pub use progress::{ProgressReporter, TracingProgress};
pub use report::{Resolution, ResolvedRow, RunReport};
