use crate::config::SchemaConfig;
use crate::error::{ReconError, Result, Stage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Field key under which a record exposes its canonical name.
pub const NAME_FIELD: &str = "name";

/// One row of source data. Never mutated after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Position in the input collection.
    pub row: usize,
    pub name: Option<String>,
    /// Secondary identity fields; a missing value is an absent key.
    pub identifiers: BTreeMap<String, String>,
    /// The full source row, passed through untouched.
    pub attributes: Map<String, Value>,
}

impl Record {
    pub fn new(row: usize, name: Option<&str>) -> Self {
        Self {
            row,
            name: name.map(str::to_string),
            identifiers: BTreeMap::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_identifier(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.identifiers.insert(column.into(), value.into());
        self
    }

    pub fn identifier(&self, column: &str) -> Option<&str> {
        self.identifiers.get(column).map(String::as_str)
    }

    /// Build a record from a tabular row. Every configured column must be
    /// present; `null` and empty cells are missing values.
    pub fn from_row(row: usize, values: &Map<String, Value>, schema: &SchemaConfig) -> Result<Self> {
        let name = match values.get(&schema.name_column) {
            Some(v) => cell_text(v),
            None => return Err(ReconError::schema_mismatch(Stage::Load, &schema.name_column, row)),
        };
        let mut identifiers = BTreeMap::new();
        for column in &schema.identifier_columns {
            match values.get(column) {
                Some(v) => {
                    if let Some(text) = cell_text(v) {
                        identifiers.insert(column.clone(), text);
                    }
                }
                None => return Err(ReconError::schema_mismatch(Stage::Load, column, row)),
            }
        }
        Ok(Self { row, name, identifiers, attributes: values.clone() })
    }
}

/// Render a cell as text. Numbers keep their JSON form so `1001` stays `"1001"`.
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Read access to comparable field values, shared by live records and stored
/// training examples.
pub trait FieldValues {
    fn value(&self, field: &str) -> Option<&str>;
}

impl FieldValues for BTreeMap<String, String> {
    fn value(&self, field: &str) -> Option<&str> {
        self.get(field).map(String::as_str)
    }
}

/// A record alongside its derived canonical name.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub record: Record,
    pub canonical_name: Option<String>,
}

impl CanonicalRecord {
    /// Comparable values keyed by field, with the canonical name under [`NAME_FIELD`].
    pub fn field_values(&self) -> BTreeMap<String, String> {
        let mut values = self.record.identifiers.clone();
        if let Some(name) = &self.canonical_name {
            values.insert(NAME_FIELD.to_string(), name.clone());
        }
        values
    }
}

impl FieldValues for CanonicalRecord {
    fn value(&self, field: &str) -> Option<&str> {
        if field == NAME_FIELD {
            self.canonical_name.as_deref()
        } else {
            self.record.identifier(field)
        }
    }
}

/// Opaque cluster identifier, stable for identical input and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub usize);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A set of records judged to be the same entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    /// Indices into the clustered record slice, ascending.
    pub members: Vec<usize>,
    /// Mean pairwise match probability; 1.0 for singletons.
    pub score: f64,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceTier::Low => write!(f, "Low"),
            ConfidenceTier::Medium => write!(f, "Medium"),
            ConfidenceTier::High => write!(f, "High"),
        }
    }
}

/// Most frequent identifier of a cluster; `Missing` serializes as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Representative {
    Value(String),
    Missing,
}

impl Representative {
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Representative::Value(v) => Some(v),
            Representative::Missing => None,
        }
    }
}

/// External reference entity a cluster can be linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalGroup {
    pub name: String,
    pub group: String,
}

impl CanonicalGroup {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self { name: name.into(), group: group.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchedGroup {
    Group(String),
    NoMatch,
}

impl MatchedGroup {
    pub fn label<'a>(&'a self, no_match_label: &'a str) -> &'a str {
        match self {
            MatchedGroup::Group(g) => g,
            MatchedGroup::NoMatch => no_match_label,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, MatchedGroup::Group(_))
    }
}

/// Cached cluster-to-group decision for one matching run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAssignment {
    pub cluster_id: ClusterId,
    pub group: MatchedGroup,
    /// Fuzzy score (0-100) of the best candidate, accepted or not.
    pub score: f64,
    /// Reference name that produced the best score.
    pub matched_name: Option<String>,
}
