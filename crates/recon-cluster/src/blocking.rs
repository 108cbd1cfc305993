//! Blocking: restrict comparisons to records sharing an index key.

use crate::features::{FieldKind, MatchField};
use recon_core::FieldValues;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const PREFIX_LEN: usize = 4;
const MIN_TOKEN_LEN: usize = 2;
/// Members of an oversized block are paired with this many successors in
/// sort-key order.
const NEIGHBOURHOOD_WINDOW: usize = 4;

/// Unordered pair of record indices, stored with `left < right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidatePair {
    pub left: usize,
    pub right: usize,
}

impl CandidatePair {
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            Self { left: a, right: b }
        } else {
            Self { left: b, right: a }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockingStats {
    pub blocks: usize,
    /// Blocks above the size cap, paired by sorted neighbourhood only.
    pub windowed_blocks: usize,
    pub pairs: usize,
}

fn normalize_token(token: &str) -> String {
    token.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect()
}

/// Index keys for one record: the whole compacted name, its tokens and its
/// prefix for text fields, the normalized value for exact fields.
pub fn block_keys<R: FieldValues + ?Sized>(record: &R, fields: &[MatchField]) -> Vec<String> {
    let mut keys = BTreeSet::new();
    for field in fields {
        let Some(value) = record.value(&field.name) else { continue };
        match field.kind {
            FieldKind::Text => {
                for token in value.split_whitespace().map(normalize_token) {
                    if token.chars().count() >= MIN_TOKEN_LEN {
                        keys.insert(format!("t:{}:{}", field.name, token));
                    }
                }
                let compact = normalize_token(value);
                if !compact.is_empty() {
                    let prefix: String = compact.chars().take(PREFIX_LEN).collect();
                    keys.insert(format!("p:{}:{}", field.name, prefix));
                    keys.insert(format!("n:{}:{}", field.name, compact));
                }
            }
            FieldKind::Exact => {
                let v = value.trim().to_lowercase();
                if !v.is_empty() {
                    keys.insert(format!("x:{}:{}", field.name, v));
                }
            }
        }
    }
    keys.into_iter().collect()
}

/// Ordering key for the sorted-neighbourhood pass: every field's normalized
/// value, in field order.
fn sort_key<R: FieldValues + ?Sized>(record: &R, fields: &[MatchField]) -> String {
    fields
        .iter()
        .map(|field| match (record.value(&field.name), field.kind) {
            (Some(v), FieldKind::Text) => normalize_token(v),
            (Some(v), FieldKind::Exact) => v.trim().to_lowercase(),
            (None, _) => String::new(),
        })
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

/// Distinct candidate pairs in ascending order. Blocks up to `max_block_size`
/// are compared exhaustively. Larger blocks are sorted by field values and each
/// member is paired with its next few neighbours, which keeps records with
/// identical names chained together without a quadratic comparison space.
pub fn candidate_pairs<R: FieldValues>(
    records: &[R],
    fields: &[MatchField],
    max_block_size: usize,
) -> (Vec<CandidatePair>, BlockingStats) {
    let mut blocks: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        for key in block_keys(record, fields) {
            blocks.entry(key).or_default().push(i);
        }
    }

    let mut stats = BlockingStats { blocks: blocks.len(), ..Default::default() };
    let mut pairs = BTreeSet::new();
    for (key, members) in &blocks {
        if members.len() < 2 {
            continue;
        }
        if members.len() > max_block_size {
            tracing::debug!(block = %key, size = members.len(), "oversized block, pairing sorted neighbours");
            stats.windowed_blocks += 1;
            let mut sorted: Vec<(String, usize)> =
                members.iter().map(|&i| (sort_key(&records[i], fields), i)).collect();
            sorted.sort();
            for (n, (_, a)) in sorted.iter().enumerate() {
                for (_, b) in sorted[n + 1..].iter().take(NEIGHBOURHOOD_WINDOW) {
                    pairs.insert(CandidatePair::new(*a, *b));
                }
            }
            continue;
        }
        for (n, &a) in members.iter().enumerate() {
            for &b in &members[n + 1..] {
                pairs.insert(CandidatePair::new(a, b));
            }
        }
    }
    stats.pairs = pairs.len();
    (pairs.into_iter().collect(), stats)
}
