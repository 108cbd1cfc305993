use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Canonicalize,
    Cluster,
    Confidence,
    Representative,
    GroupMatch,
    ReferenceConsolidation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Load => write!(f, "load"),
            Stage::Canonicalize => write!(f, "canonicalize"),
            Stage::Cluster => write!(f, "cluster"),
            Stage::Confidence => write!(f, "confidence"),
            Stage::Representative => write!(f, "representative"),
            Stage::GroupMatch => write!(f, "group_match"),
            Stage::ReferenceConsolidation => write!(f, "reference_consolidation"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Configuration missing: {what} ({detail})")]
    ConfigurationMissing { what: String, detail: String },
    #[error("Schema mismatch in {stage}: column `{column}` missing at row {row}")]
    SchemaMismatch { stage: Stage, column: String, row: usize },
    #[error("Invalid rule: {0}")]
    InvalidRule(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Stage {stage} failed at {context}: {source}")]
    Stage {
        stage: Stage,
        context: String,
        #[source]
        source: Box<ReconError>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReconError {
    pub fn configuration_missing(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ConfigurationMissing { what: what.into(), detail: detail.into() }
    }

    pub fn schema_mismatch(stage: Stage, column: impl Into<String>, row: usize) -> Self {
        Self::SchemaMismatch { stage, column: column.into(), row }
    }

    /// Attach the failing stage and the record/cluster being processed.
    pub fn in_stage(self, stage: Stage, context: impl Into<String>) -> Self {
        Self::Stage { stage, context: context.into(), source: Box::new(self) }
    }

    /// Stage this error is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } | Self::SchemaMismatch { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
