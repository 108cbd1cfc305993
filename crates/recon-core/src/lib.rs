//! Shared data model, configuration and error taxonomy for counterparty
//! reconciliation.

pub mod config;
pub mod error;
pub mod similarity;
pub mod types;

pub use config::{
    CanonConfig, LearningConfig, MatchingConfig, MissingNoiseListPolicy, ReconConfig,
    ReferenceSchemaConfig, SchemaConfig,
};
pub use error::{ReconError, Result, Stage};
pub use types::*;
