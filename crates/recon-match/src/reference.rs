//! Canonical reference list preparation.

use recon_core::{cell_text, CanonicalGroup, ReconError, ReferenceSchemaConfig, Result, Stage};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Read reference rows. Both columns must exist on every row; rows with a
/// blank name or group are skipped.
pub fn reference_from_rows(rows: &[Map<String, Value>], schema: &ReferenceSchemaConfig) -> Result<Vec<CanonicalGroup>> {
    let mut groups = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for (i, row) in rows.iter().enumerate() {
        let name = row
            .get(&schema.name_column)
            .ok_or_else(|| ReconError::schema_mismatch(Stage::GroupMatch, &schema.name_column, i))?;
        let group = row
            .get(&schema.group_column)
            .ok_or_else(|| ReconError::schema_mismatch(Stage::GroupMatch, &schema.group_column, i))?;
        match (cell_text(name), cell_text(group)) {
            (Some(name), Some(group)) => groups.push(CanonicalGroup::new(name.trim(), group.trim())),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "reference rows without name or group");
    }
    if groups.is_empty() {
        return Err(ReconError::configuration_missing("reference list", "no rows with both name and group"));
    }
    Ok(groups)
}

/// Drop repeated (name, group) entries, keeping first occurrences in order.
pub fn dedup_reference(groups: Vec<CanonicalGroup>) -> Vec<CanonicalGroup> {
    let mut seen = HashSet::new();
    groups
        .into_iter()
        .filter(|g| seen.insert((g.name.clone(), g.group.clone())))
        .collect()
}
