//! Run output: resolved rows plus a summary report.

use chrono::{DateTime, Duration, Utc};
use recon_cluster::{StopReason, TrainingData};
use recon_core::{ClusterId, ConfidenceTier, ReconError, Representative, Stage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const DERIVED_COLUMNS: &[&str] = &[
    "canonical_name",
    "cluster_id",
    "confidence",
    "confidence_level",
    "most_frequent_identifier",
    "Matched Group",
];

/// One input row with every derived column the run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRow {
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    pub canonical_name: Option<String>,
    pub cluster_id: ClusterId,
    pub confidence: f64,
    pub confidence_level: ConfidenceTier,
    pub most_frequent_identifier: Representative,
    /// Absent when group matching did not complete.
    #[serde(rename = "Matched Group", skip_serializing_if = "Option::is_none")]
    pub matched_group: Option<String>,
}

impl ResolvedRow {
    /// Source attributes with any stale derived columns removed.
    pub fn passthrough(mut attributes: Map<String, Value>) -> Map<String, Value> {
        for column in DERIVED_COLUMNS {
            attributes.remove(*column);
        }
        attributes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub input_rows: usize,
    pub excluded_rows: usize,
    pub records: usize,
    pub clusters: usize,
    pub singleton_clusters: usize,
    pub candidate_pairs: usize,
    pub linked_pairs: usize,
    pub labels_requested: usize,
    pub human_labels: usize,
    pub abstentions: usize,
    pub learning_stop: StopReason,
    pub tiers: BTreeMap<ConfidenceTier, usize>,
    pub matched_clusters: usize,
    pub unmatched_clusters: usize,
    pub failed_stage: Option<Stage>,
}

impl RunReport {
    pub fn duration(&self) -> Duration {
        self.finished_at - self.started_at
    }
}

/// Everything a run produced. When `failure` is set, rows still carry the
/// annotations of the stages that completed.
#[derive(Debug)]
pub struct Resolution {
    /// Ordered by cluster id, input order within a cluster.
    pub rows: Vec<ResolvedRow>,
    pub report: RunReport,
    /// Human labels from this run, reusable as seed data.
    pub training: TrainingData,
    pub failure: Option<ReconError>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}
