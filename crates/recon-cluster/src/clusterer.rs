//! Global clustering: score every candidate pair, link the ones above the
//! match threshold, take connected components.

use crate::blocking::{candidate_pairs, BlockingStats, CandidatePair};
use crate::features::{pair_features, MatchField};
use crate::labeling::Labeler;
use crate::learner::{ActiveLearner, LabelSource, PairwiseLabel, StopReason};
use crate::training::TrainingData;
use petgraph::unionfind::UnionFind;
use recon_core::{CanonicalRecord, Cluster, ClusterId, LearningConfig};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ClusterOutput {
    /// Ordered by id; ids follow the first member's position.
    pub clusters: Vec<Cluster>,
    /// Cluster of each input record, by index.
    pub assignments: Vec<ClusterId>,
    /// Every scored pair: human and seeded labels first, then model decisions.
    pub labels: Vec<PairwiseLabel>,
    pub blocking: BlockingStats,
    pub linked_pairs: usize,
    pub requested: usize,
    pub abstentions: usize,
    pub stop: StopReason,
}

impl ClusterOutput {
    /// Every record alone in its own cluster.
    pub fn singletons(n: usize, blocking: BlockingStats) -> Self {
        let (clusters, assignments) = connected_clusters(n, &[], 0.0);
        Self {
            clusters,
            assignments,
            labels: Vec::new(),
            blocking,
            linked_pairs: 0,
            requested: 0,
            abstentions: 0,
            stop: StopReason::NoCandidates,
        }
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.0).filter(|c| c.id == id)
    }

    pub fn cluster_of(&self, record: usize) -> Option<&Cluster> {
        self.assignments.get(record).and_then(|id| self.cluster(*id))
    }

    /// Every record in exactly one cluster, and assignments agree with membership.
    pub fn is_partition(&self, n: usize) -> bool {
        if self.assignments.len() != n {
            return false;
        }
        let mut seen = vec![false; n];
        for cluster in &self.clusters {
            if cluster.is_empty() {
                return false;
            }
            for &m in &cluster.members {
                if m >= n || seen[m] || self.assignments[m] != cluster.id {
                    return false;
                }
                seen[m] = true;
            }
        }
        seen.into_iter().all(|s| s)
    }

    /// Human labels of this run, for seeding the next one.
    pub fn training_data(&self, records: &[CanonicalRecord], fields: &[MatchField]) -> TrainingData {
        TrainingData::from_labels(records, &self.labels, fields)
    }
}

/// Connected components of the graph whose edges are pairs scored strictly
/// above `threshold`. Cluster score is the mean probability over scored pairs
/// inside the component, 1.0 for singletons.
pub fn connected_clusters(
    n: usize,
    scored: &[(CandidatePair, f64)],
    threshold: f64,
) -> (Vec<Cluster>, Vec<ClusterId>) {
    let mut uf = UnionFind::<usize>::new(n);
    for (pair, p) in scored {
        if *p > threshold {
            uf.union(pair.left, pair.right);
        }
    }

    let mut ids: HashMap<usize, usize> = HashMap::new();
    let mut members: Vec<Vec<usize>> = Vec::new();
    let mut assignments = Vec::with_capacity(n);
    for (record, root) in uf.into_labeling().into_iter().enumerate() {
        let id = *ids.entry(root).or_insert_with(|| {
            members.push(Vec::new());
            members.len() - 1
        });
        members[id].push(record);
        assignments.push(ClusterId(id));
    }

    let mut sums = vec![(0.0f64, 0usize); members.len()];
    for (pair, p) in scored {
        let a = assignments[pair.left];
        if a == assignments[pair.right] {
            sums[a.0].0 += p;
            sums[a.0].1 += 1;
        }
    }

    let clusters = members
        .into_iter()
        .zip(sums)
        .enumerate()
        .map(|(id, (members, (sum, count)))| Cluster {
            id: ClusterId(id),
            score: if members.len() < 2 || count == 0 { 1.0 } else { sum / count as f64 },
            members,
        })
        .collect();
    (clusters, assignments)
}

#[derive(Debug, Clone)]
pub struct Clusterer {
    config: LearningConfig,
    fields: Vec<MatchField>,
}

impl Clusterer {
    pub fn new(config: LearningConfig, fields: Vec<MatchField>) -> Self {
        Self { config, fields }
    }

    pub fn fields(&self) -> &[MatchField] {
        &self.fields
    }

    /// Never fails: with no candidate pairs every record is its own cluster.
    pub fn cluster(
        &self,
        records: &[CanonicalRecord],
        training: &TrainingData,
        labeler: &mut dyn Labeler,
    ) -> ClusterOutput {
        let (pairs, blocking) = candidate_pairs(records, &self.fields, self.config.max_block_size);
        tracing::info!(
            records = records.len(),
            blocks = blocking.blocks,
            windowed = blocking.windowed_blocks,
            pairs = pairs.len(),
            "blocking done"
        );
        if pairs.is_empty() {
            tracing::warn!(records = records.len(), "no candidate pairs, every record is a singleton cluster");
            return ClusterOutput::singletons(records.len(), blocking);
        }

        let features: Vec<Vec<f64>> = pairs
            .iter()
            .map(|p| pair_features(&self.fields, &records[p.left], &records[p.right]))
            .collect();

        let learner = ActiveLearner::new(&self.config, &self.fields);
        let outcome = learner.learn(records, &pairs, &features, training, labeler);

        let known: HashMap<CandidatePair, bool> = outcome.labels.iter().map(|l| (l.pair, l.is_match)).collect();
        let mut labels = outcome.labels;
        let mut scored = Vec::with_capacity(pairs.len());
        for (pair, x) in pairs.iter().zip(&features) {
            let p = match known.get(pair) {
                Some(true) => 1.0,
                Some(false) => 0.0,
                None => {
                    let p = outcome.classifier.predict(x);
                    labels.push(PairwiseLabel {
                        pair: *pair,
                        is_match: p > self.config.match_threshold,
                        probability: p,
                        source: LabelSource::Model,
                    });
                    p
                }
            };
            scored.push((*pair, p));
        }

        let linked_pairs = scored.iter().filter(|(_, p)| *p > self.config.match_threshold).count();
        let (clusters, assignments) = connected_clusters(records.len(), &scored, self.config.match_threshold);
        tracing::info!(clusters = clusters.len(), linked_pairs, "clustering done");

        ClusterOutput {
            clusters,
            assignments,
            labels,
            blocking,
            linked_pairs,
            requested: outcome.requested,
            abstentions: outcome.abstentions,
            stop: outcome.stop,
        }
    }
}
