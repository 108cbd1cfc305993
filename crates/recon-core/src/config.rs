use crate::error::{ReconError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub schema: SchemaConfig,
    pub reference: ReferenceSchemaConfig,
    pub canon: CanonConfig,
    pub learning: LearningConfig,
    pub matching: MatchingConfig,
}

/// Column layout of the main record collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub name_column: String,
    pub identifier_columns: Vec<String>,
    pub representative_column: String,
    /// Rows whose raw name contains one of these (case-insensitive) are dropped on load.
    pub exclude_name_markers: Vec<String>,
}

/// Column layout of the canonical reference list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSchemaConfig {
    pub name_column: String,
    pub group_column: String,
}

/// What to do when the noise-substring list cannot be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingNoiseListPolicy {
    /// Abort the run with `ConfigurationMissing`.
    #[default]
    Fail,
    /// Canonicalize with whitespace trimming only.
    TrimOnly,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonConfig {
    pub noise_list_path: Option<PathBuf>,
    pub on_missing_noise_list: MissingNoiseListPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Labels requested as a fraction of the candidate pair count.
    pub labeling_budget_fraction: f64,
    pub max_labels: usize,
    /// Stop asking once the most uncertain pair is below this (0 = certain, 1 = coin flip).
    pub convergence_threshold: f64,
    /// Pairs scored strictly above this are linked.
    pub match_threshold: f64,
    pub label_timeout_secs: u64,
    /// Blocks larger than this are skipped.
    pub max_block_size: usize,
    /// Candidate pairs sampled for uncertainty queries.
    pub training_pool_size: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum fuzzy score (0-100) to accept a group.
    pub acceptance_threshold: f64,
    pub chunk_size: usize,
    pub no_match_label: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            name_column: "CUSTOMER_NAME".into(),
            identifier_columns: vec!["XOFPARTY_ID".into(), "TAX_REG_NUMBER".into()],
            representative_column: "XOFPARTY_ID".into(),
            exclude_name_markers: vec!["CASH CUSTOMERS".into()],
        }
    }
}

impl Default for ReferenceSchemaConfig {
    fn default() -> Self {
        Self {
            name_column: "INSURED_RI".into(),
            group_column: "SAM_GROUP_NAME".into(),
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            labeling_budget_fraction: 0.3,
            max_labels: 100,
            convergence_threshold: 0.1,
            match_threshold: 0.5,
            label_timeout_secs: 300,
            max_block_size: 500,
            training_pool_size: 5000,
            seed: 42,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 85.0,
            chunk_size: 1000,
            no_match_label: "No Match".into(),
        }
    }
}

impl ReconConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load once at run start. A missing file is a configuration failure.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ReconError::configuration_missing(format!("config file {}", path.display()), e.to_string())
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        let l = &self.learning;
        if !(l.labeling_budget_fraction > 0.0 && l.labeling_budget_fraction <= 1.0) {
            return Err(ReconError::InvalidConfig(format!(
                "labeling_budget_fraction must be in (0, 1], got {}",
                l.labeling_budget_fraction
            )));
        }
        if !(0.0..=1.0).contains(&l.convergence_threshold) {
            return Err(ReconError::InvalidConfig(format!(
                "convergence_threshold must be in [0, 1], got {}",
                l.convergence_threshold
            )));
        }
        if !(0.0..1.0).contains(&l.match_threshold) {
            return Err(ReconError::InvalidConfig(format!(
                "match_threshold must be in [0, 1), got {}",
                l.match_threshold
            )));
        }
        if l.max_block_size < 2 {
            return Err(ReconError::InvalidConfig("max_block_size must be at least 2".into()));
        }
        let m = &self.matching;
        if !(0.0..=100.0).contains(&m.acceptance_threshold) {
            return Err(ReconError::InvalidConfig(format!(
                "acceptance_threshold must be in [0, 100], got {}",
                m.acceptance_threshold
            )));
        }
        if m.chunk_size == 0 {
            return Err(ReconError::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.schema.name_column.is_empty() {
            return Err(ReconError::InvalidConfig("name_column is empty".into()));
        }
        if !self.schema.identifier_columns.contains(&self.schema.representative_column) {
            return Err(ReconError::InvalidConfig(format!(
                "representative_column {} is not an identifier column",
                self.schema.representative_column
            )));
        }
        Ok(())
    }
}
