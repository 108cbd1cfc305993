//! Most frequent identifier per cluster.

use recon_core::{CanonicalRecord, Cluster, ClusterId, Representative};
use std::collections::{BTreeMap, HashMap};

/// Mode of the present values; ties go to the value seen first.
pub fn most_frequent<'a, I>(values: I) -> Representative
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, value) in values.into_iter().flatten().enumerate() {
        counts.entry(value).or_insert((0, pos)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, pa)), (_, (cb, pb))| ca.cmp(cb).then(pb.cmp(pa)))
        .map(|(v, _)| Representative::Value(v.to_string()))
        .unwrap_or(Representative::Missing)
}

pub fn select_representatives(
    records: &[CanonicalRecord],
    clusters: &[Cluster],
    column: &str,
) -> BTreeMap<ClusterId, Representative> {
    clusters
        .iter()
        .map(|cluster| {
            let values = cluster.members.iter().map(|&m| records[m].record.identifier(column));
            (cluster.id, most_frequent(values))
        })
        .collect()
}

/// Per-record view of the cluster representatives.
pub fn join_representatives(
    assignments: &[ClusterId],
    representatives: &BTreeMap<ClusterId, Representative>,
) -> Vec<Representative> {
    assignments
        .iter()
        .map(|id| representatives.get(id).cloned().unwrap_or(Representative::Missing))
        .collect()
}
