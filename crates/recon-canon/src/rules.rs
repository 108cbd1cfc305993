//! Ordered rule table for canonicalization.

use recon_core::{ReconError, Result};
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maps any name containing one of `markers` to `label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRule {
    pub markers: Vec<String>,
    pub label: String,
}

impl AliasRule {
    pub fn new(markers: &[&str], label: &str) -> Self {
        Self {
            markers: markers.iter().map(|m| m.to_string()).collect(),
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub pattern: String,
    pub replacement: String,
}

/// Uncompiled, serializable rule table. Every list is applied in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSpec {
    pub truncate_at: Vec<String>,
    pub noise: Vec<String>,
    pub replacements: Vec<Replacement>,
    pub aliases: Vec<AliasRule>,
    pub punctuation: Vec<char>,
}

fn s(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl RuleSpec {
    /// Built-in rules used with or without an external noise list.
    pub fn builtin() -> Self {
        Self {
            truncate_at: s(&[" c/o"]),
            noise: s(&["CASH CUSTOMER", "BANCA-", "BANCA", "(oman)", "L L C", " LLC", " L.L.C"]),
            replacements: vec![
                Replacement { pattern: "(RE)INSURANCE".into(), replacement: "RE".into() },
                Replacement { pattern: "REINSURANCE".into(), replacement: "RE".into() },
            ],
            aliases: vec![
                AliasRule::new(&["TOKIO", "TOKIA"], "Tokio Marines"),
                AliasRule::new(&["SWISS RE"], "Swiss re"),
                AliasRule::new(&["AON"], "AON"),
                AliasRule::new(&["GIG"], "GIG INSURANCE"),
                AliasRule::new(&["ADNIC"], "ADNIC"),
                AliasRule::new(&["MARSH"], "MARSH ACCOUNTS"),
                AliasRule::new(&["ADNOC"], "ADNOC"),
            ],
            punctuation: vec!['-', '.'],
        }
    }

    /// No removals, rewrites or aliases: canonicalization only trims.
    pub fn trim_only() -> Self {
        Self::default()
    }

    /// Prepend externally maintained noise terms ahead of the built-ins.
    pub fn with_noise_terms(mut self, terms: impl IntoIterator<Item = String>) -> Self {
        let mut noise: Vec<String> = terms.into_iter().collect();
        noise.append(&mut self.noise);
        self.noise = noise;
        self
    }
}

/// Load an externally maintained noise list: one term per line, blank lines
/// ignored. Any read failure is a configuration failure.
pub fn load_noise_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        ReconError::configuration_missing(format!("noise list {}", path.display()), e.to_string())
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn case_insensitive(literal: &str) -> Result<Regex> {
    Regex::new(&format!("(?i){}", regex::escape(literal)))
        .map_err(|e| ReconError::InvalidRule(format!("`{literal}`: {e}")))
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledAlias {
    pub markers: Vec<String>,
    pub label: String,
}

/// Compiled rule table, immutable for the lifetime of a run.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    truncations: Vec<Regex>,
    removals: Vec<Regex>,
    replacements: Vec<(Regex, String)>,
    pub(crate) aliases: Vec<CompiledAlias>,
    punctuation: Vec<char>,
}

impl RuleTable {
    pub fn compile(spec: &RuleSpec) -> Result<Self> {
        let truncations = spec
            .truncate_at
            .iter()
            .filter(|m| !m.is_empty())
            .map(|m| case_insensitive(m))
            .collect::<Result<Vec<_>>>()?;
        let removals = spec
            .noise
            .iter()
            .filter(|n| !n.is_empty())
            .map(|n| case_insensitive(n))
            .collect::<Result<Vec<_>>>()?;

        let mut replacements = Vec::with_capacity(spec.replacements.len());
        for r in &spec.replacements {
            // Every productive pass must shrink the text, or reduction may not settle.
            if r.replacement.chars().count() >= r.pattern.chars().count() {
                return Err(ReconError::InvalidRule(format!(
                    "replacement `{}` -> `{}` does not shorten the text",
                    r.pattern, r.replacement
                )));
            }
            replacements.push((case_insensitive(&r.pattern)?, r.replacement.clone()));
        }

        let mut aliases = Vec::with_capacity(spec.aliases.len());
        for a in &spec.aliases {
            if a.markers.is_empty() || a.markers.iter().any(|m| m.trim().is_empty()) {
                return Err(ReconError::InvalidRule(format!("alias `{}` has an empty marker", a.label)));
            }
            aliases.push(CompiledAlias {
                markers: a.markers.iter().map(|m| m.to_uppercase()).collect(),
                label: a.label.clone(),
            });
        }

        Ok(Self {
            truncations,
            removals,
            replacements,
            aliases,
            punctuation: spec.punctuation.clone(),
        })
    }

    /// One pass of truncation, removal, rewrite, punctuation and trim.
    pub(crate) fn apply_pass(&self, text: &str) -> String {
        let mut result = text.to_string();
        for re in &self.truncations {
            if let Some(m) = re.find(&result) {
                result.truncate(m.start());
            }
        }
        for re in &self.removals {
            result = re.replace_all(&result, "").into_owned();
        }
        for (re, replacement) in &self.replacements {
            result = re.replace_all(&result, NoExpand(replacement)).into_owned();
        }
        if !self.punctuation.is_empty() {
            result.retain(|c| !self.punctuation.contains(&c));
        }
        result.trim().to_string()
    }

    /// Index of the first alias rule whose marker occurs in `text`.
    pub(crate) fn alias_index(&self, text: &str) -> Option<usize> {
        let upper = text.to_uppercase();
        self.aliases
            .iter()
            .position(|a| a.markers.iter().any(|m| upper.contains(m.as_str())))
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }
}
