//! Duplicate detection over canonicalized records.
//!
//! Stages:
//! 1. Blocking: only records sharing a name token, name prefix or identifier are compared
//! 2. Features: per-field similarity vector for each candidate pair
//! 3. Active learning: uncertainty-sampled labels retrain a logistic pair classifier
//! 4. Clustering: connected components over pairs scored above the match threshold
//!
//! Cluster annotations (confidence tier, representative identifier) live in
//! [`confidence`] and [`representative`].

pub mod blocking;
pub mod clusterer;
pub mod confidence;
pub mod features;
pub mod labeling;
pub mod learner;
pub mod model;
pub mod representative;
pub mod training;

pub use blocking::{candidate_pairs, BlockingStats, CandidatePair};
pub use clusterer::{connected_clusters, ClusterOutput, Clusterer};
pub use confidence::classify;
pub use features::{FieldKind, MatchField};
pub use labeling::{ChannelLabeler, FnLabeler, LabelAnswer, LabelDesk, LabelRequest, LabelResponse, Labeler, NoLabeler};
pub use learner::{ActiveLearner, LabelSource, LearningOutcome, PairwiseLabel, StopReason};
pub use model::PairClassifier;
pub use representative::{most_frequent, select_representatives};
pub use training::TrainingData;
