//! Persisted labels, reusable across runs.

use crate::features::{compared_values, pair_features, MatchField};
use crate::learner::{LabelSource, PairwiseLabel};
use recon_core::{CanonicalRecord, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub type FieldMap = BTreeMap<String, String>;

/// Labeled pairs keyed by compared field values rather than row positions,
/// so they survive re-ordered or refreshed input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingData {
    #[serde(rename = "match", default)]
    pub matches: Vec<(FieldMap, FieldMap)>,
    #[serde(default)]
    pub distinct: Vec<(FieldMap, FieldMap)>,
}

impl TrainingData {
    pub fn len(&self) -> usize {
        self.matches.len() + self.distinct.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, left: FieldMap, right: FieldMap, is_match: bool) {
        if is_match {
            self.matches.push((left, right));
        } else {
            self.distinct.push((left, right));
        }
    }

    /// Human labels from a run, ready to seed the next one.
    pub fn from_labels(records: &[CanonicalRecord], labels: &[PairwiseLabel], fields: &[MatchField]) -> Self {
        let mut data = Self::default();
        for label in labels.iter().filter(|l| l.source == LabelSource::Human) {
            data.push(
                compared_values(&records[label.pair.left], fields),
                compared_values(&records[label.pair.right], fields),
                label.is_match,
            );
        }
        data
    }

    pub fn merge(&mut self, other: TrainingData) {
        self.matches.extend(other.matches);
        self.distinct.extend(other.distinct);
    }

    pub fn feature_examples(&self, fields: &[MatchField]) -> Vec<(Vec<f64>, bool)> {
        let matches = self.matches.iter().map(|(l, r)| (pair_features(fields, l, r), true));
        let distinct = self.distinct.iter().map(|(l, r)| (pair_features(fields, l, r), false));
        matches.chain(distinct).collect()
    }

    /// Known decisions, looked up in either orientation.
    pub fn decisions(&self) -> HashMap<(FieldMap, FieldMap), bool> {
        let mut known = HashMap::new();
        for (pairs, is_match) in [(&self.matches, true), (&self.distinct, false)] {
            for (l, r) in pairs {
                known.insert((l.clone(), r.clone()), is_match);
                known.insert((r.clone(), l.clone()), is_match);
            }
        }
        known
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn write_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}
