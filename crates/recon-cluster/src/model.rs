//! Logistic pair classifier regularized toward a hand-set prior.

use crate::features::{FieldKind, MatchField};
use serde::{Deserialize, Serialize};

const EPOCHS: usize = 300;
const LEARNING_RATE: f64 = 0.5;
const L2: f64 = 0.01;

// Prior weights per feature.
const TEXT_WEIGHT: f64 = 2.0;
const EXACT_EQUAL_WEIGHT: f64 = 3.0;
const EXACT_PRESENT_WEIGHT: f64 = -1.5;
const BIAS_PER_TEXT_FIELD: f64 = -4.0;
const BIAS_WITHOUT_TEXT: f64 = -1.0;

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairClassifier {
    weights: Vec<f64>,
    bias: f64,
    prior_weights: Vec<f64>,
    prior_bias: f64,
}

impl PairClassifier {
    /// Untrained classifier: similar text and agreeing identifiers push toward
    /// a match, disagreeing identifiers push away.
    pub fn prior(fields: &[MatchField]) -> Self {
        let mut weights = Vec::new();
        let mut text_fields = 0usize;
        for field in fields {
            match field.kind {
                FieldKind::Text => {
                    text_fields += 1;
                    weights.extend_from_slice(&[TEXT_WEIGHT; 3]);
                }
                FieldKind::Exact => weights.extend_from_slice(&[EXACT_EQUAL_WEIGHT, EXACT_PRESENT_WEIGHT]),
            }
        }
        let bias = if text_fields == 0 {
            BIAS_WITHOUT_TEXT
        } else {
            BIAS_PER_TEXT_FIELD * text_fields as f64
        };
        Self { prior_weights: weights.clone(), prior_bias: bias, weights, bias }
    }

    /// Match probability in [0, 1].
    pub fn predict(&self, features: &[f64]) -> f64 {
        debug_assert_eq!(features.len(), self.weights.len());
        let z: f64 = self.weights.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + self.bias;
        sigmoid(z)
    }

    /// Retrain from the prior on all labeled examples. Deterministic for a
    /// given example sequence.
    pub fn fit(&mut self, examples: &[(Vec<f64>, bool)]) {
        self.weights = self.prior_weights.clone();
        self.bias = self.prior_bias;
        if examples.is_empty() {
            return;
        }
        let n = examples.len() as f64;
        let dim = self.weights.len();
        for _ in 0..EPOCHS {
            let mut grad_w = vec![0.0; dim];
            let mut grad_b = 0.0;
            for (x, is_match) in examples {
                let target = if *is_match { 1.0 } else { 0.0 };
                let err = self.predict(x) - target;
                for (g, xi) in grad_w.iter_mut().zip(x) {
                    *g += err * xi;
                }
                grad_b += err;
            }
            for i in 0..dim {
                let reg = L2 * (self.weights[i] - self.prior_weights[i]);
                self.weights[i] -= LEARNING_RATE * (grad_w[i] / n + reg);
            }
            self.bias -= LEARNING_RATE * grad_b / n;
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }
}
