//! Active learning: ask about the pairs the classifier is least sure of.

use crate::blocking::CandidatePair;
use crate::features::{compared_values, MatchField};
use crate::labeling::{LabelRequest, LabelResponse, Labeler};
use crate::model::PairClassifier;
use crate::training::TrainingData;
use rand::rngs::StdRng;
use rand::SeedableRng;
use recon_core::{CanonicalRecord, LearningConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelSource {
    Human,
    /// Carried over from prior training data.
    Seeded,
    Model,
}

/// Match decision on a candidate pair. Never changed once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseLabel {
    pub pair: CandidatePair,
    pub is_match: bool,
    pub probability: f64,
    pub source: LabelSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    BudgetExhausted,
    Converged,
    PoolExhausted,
    Finished,
    NoCandidates,
}

#[derive(Debug, Clone)]
pub struct LearningOutcome {
    pub classifier: PairClassifier,
    /// Human and seeded labels, in the order they were recorded.
    pub labels: Vec<PairwiseLabel>,
    pub requested: usize,
    pub abstentions: usize,
    pub budget: usize,
    pub stop: StopReason,
}

/// 1.0 at p = 0.5, 0.0 at p = 0 or 1.
fn uncertainty(p: f64) -> f64 {
    1.0 - 2.0 * (p - 0.5).abs()
}

pub struct ActiveLearner<'a> {
    config: &'a LearningConfig,
    fields: &'a [MatchField],
}

impl<'a> ActiveLearner<'a> {
    pub fn new(config: &'a LearningConfig, fields: &'a [MatchField]) -> Self {
        Self { config, fields }
    }

    /// Labels allowed for `candidates` pairs: the configured fraction, at
    /// least one, at most `max_labels`.
    pub fn budget(&self, candidates: usize) -> usize {
        if candidates == 0 || self.config.max_labels == 0 {
            return 0;
        }
        let raw = (self.config.labeling_budget_fraction * candidates as f64).ceil() as usize;
        raw.clamp(1, self.config.max_labels)
    }

    /// Pair indices eligible for queries, sampled with a fixed seed when the
    /// candidate set is larger than the pool.
    fn training_pool(&self, n: usize) -> Vec<usize> {
        if n <= self.config.training_pool_size {
            return (0..n).collect();
        }
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut pool = rand::seq::index::sample(&mut rng, n, self.config.training_pool_size).into_vec();
        pool.sort_unstable();
        pool
    }

    pub fn learn(
        &self,
        records: &[CanonicalRecord],
        pairs: &[CandidatePair],
        features: &[Vec<f64>],
        seed: &TrainingData,
        labeler: &mut dyn Labeler,
    ) -> LearningOutcome {
        let mut classifier = PairClassifier::prior(self.fields);
        let mut examples = seed.feature_examples(self.fields);
        classifier.fit(&examples);

        let budget = self.budget(pairs.len());
        let mut labels = Vec::new();
        let mut asked = vec![false; pairs.len()];

        if !seed.is_empty() {
            let known = seed.decisions();
            for (i, pair) in pairs.iter().enumerate() {
                let key = (
                    compared_values(&records[pair.left], self.fields),
                    compared_values(&records[pair.right], self.fields),
                );
                if let Some(&is_match) = known.get(&key) {
                    asked[i] = true;
                    labels.push(PairwiseLabel {
                        pair: *pair,
                        is_match,
                        probability: if is_match { 1.0 } else { 0.0 },
                        source: LabelSource::Seeded,
                    });
                }
            }
        }

        if pairs.is_empty() {
            return LearningOutcome {
                classifier,
                labels,
                requested: 0,
                abstentions: 0,
                budget,
                stop: StopReason::NoCandidates,
            };
        }

        let pool = self.training_pool(pairs.len());
        let mut requested = 0usize;
        let mut abstentions = 0usize;

        let stop = loop {
            if requested >= budget {
                break StopReason::BudgetExhausted;
            }
            // Most uncertain unasked pair; ties go to the earliest pair.
            let next = pool
                .iter()
                .copied()
                .filter(|&i| !asked[i])
                .map(|i| {
                    let p = classifier.predict(&features[i]);
                    (i, p, uncertainty(p))
                })
                .fold(None, |best: Option<(usize, f64, f64)>, cand| match best {
                    Some(b) if b.2 >= cand.2 => Some(b),
                    _ => Some(cand),
                });
            let Some((i, probability, u)) = next else {
                break StopReason::PoolExhausted;
            };
            if u < self.config.convergence_threshold {
                break StopReason::Converged;
            }

            asked[i] = true;
            let pair = pairs[i];
            let request = LabelRequest {
                id: (requested + 1) as u64,
                pair,
                left: compared_values(&records[pair.left], self.fields),
                right: compared_values(&records[pair.right], self.fields),
                probability,
                remaining: budget - requested,
            };

            // A Finished reply ends the session without counting as a request.
            let response = labeler.label(&request);
            if response != LabelResponse::Finished {
                requested += 1;
            }
            let is_match = match response {
                LabelResponse::Match => true,
                LabelResponse::NoMatch => false,
                LabelResponse::Unsure => {
                    abstentions += 1;
                    tracing::debug!(left = pair.left, right = pair.right, "label abstained");
                    continue;
                }
                LabelResponse::Finished => break StopReason::Finished,
            };
            tracing::debug!(left = pair.left, right = pair.right, is_match, probability, "pair labeled");
            labels.push(PairwiseLabel {
                pair,
                is_match,
                probability: if is_match { 1.0 } else { 0.0 },
                source: LabelSource::Human,
            });
            examples.push((features[i].clone(), is_match));
            classifier.fit(&examples);
        };

        tracing::info!(
            candidates = pairs.len(),
            budget,
            requested,
            abstentions,
            labels = labels.len(),
            stop = ?stop,
            "active learning finished"
        );

        LearningOutcome { classifier, labels, requested, abstentions, budget, stop }
    }
}
