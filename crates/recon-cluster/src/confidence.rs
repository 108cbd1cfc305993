//! Confidence tiers from aggregate cluster scores.

use recon_core::{Cluster, ConfidenceTier};

const LOW_MAX: f64 = 0.4;
const HIGH_MIN: f64 = 0.7;

/// `<= 0.4` Low, `< 0.7` Medium, otherwise High. NaN is Low.
pub fn classify(score: f64) -> ConfidenceTier {
    if score.is_nan() || score <= LOW_MAX {
        ConfidenceTier::Low
    } else if score < HIGH_MIN {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::High
    }
}

pub fn classify_clusters(clusters: &[Cluster]) -> Vec<ConfidenceTier> {
    clusters.iter().map(|c| classify(c.score)).collect()
}
