//! Field-level similarity features for a candidate pair.

use recon_core::{similarity, FieldValues};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text compared fuzzily.
    Text,
    /// Identifier compared for equality.
    Exact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchField {
    pub name: String,
    pub kind: FieldKind,
}

impl MatchField {
    pub fn text(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: FieldKind::Text }
    }

    pub fn exact(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: FieldKind::Exact }
    }

    /// Number of features this field contributes.
    pub fn width(&self) -> usize {
        match self.kind {
            FieldKind::Text => 3,
            FieldKind::Exact => 2,
        }
    }
}

pub fn feature_width(fields: &[MatchField]) -> usize {
    fields.iter().map(MatchField::width).sum()
}

/// Text: `[jaro_winkler, token_sort_ratio / 100, token_jaccard]`.
/// Exact: `[equal, both_present]`. Missing values score zero.
pub fn pair_features<L, R>(fields: &[MatchField], left: &L, right: &R) -> Vec<f64>
where
    L: FieldValues + ?Sized,
    R: FieldValues + ?Sized,
{
    let mut out = Vec::with_capacity(feature_width(fields));
    for field in fields {
        let pair = (left.value(&field.name), right.value(&field.name));
        match field.kind {
            FieldKind::Text => match pair {
                (Some(a), Some(b)) => {
                    out.push(similarity::jaro_winkler(a, b));
                    out.push(similarity::token_sort_ratio(a, b) / 100.0);
                    out.push(similarity::token_jaccard(a, b));
                }
                _ => out.extend_from_slice(&[0.0, 0.0, 0.0]),
            },
            FieldKind::Exact => match pair {
                (Some(a), Some(b)) => {
                    let equal = a.trim().eq_ignore_ascii_case(b.trim());
                    out.push(if equal { 1.0 } else { 0.0 });
                    out.push(1.0);
                }
                _ => out.extend_from_slice(&[0.0, 0.0]),
            },
        }
    }
    out
}

/// Values of the compared fields only, as shown to labelers and stored in training data.
pub fn compared_values<R: FieldValues + ?Sized>(record: &R, fields: &[MatchField]) -> BTreeMap<String, String> {
    fields
        .iter()
        .filter_map(|f| record.value(&f.name).map(|v| (f.name.clone(), v.to_string())))
        .collect()
}
