//! Fuzzy group matching, one decision per cluster per run.

use crate::context::MatchContext;
use recon_canon::Canonicalizer;
use recon_core::{
    similarity, CanonicalGroup, ClusterId, GroupAssignment, MatchedGroup, MatchingConfig, ReconError, Result,
};
use std::sync::OnceLock;

/// One row of the clustered record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchInput<'a> {
    pub cluster_id: ClusterId,
    /// Raw name; canonicalized by the matcher.
    pub name: Option<&'a str>,
}

impl<'a> MatchInput<'a> {
    pub fn new(cluster_id: ClusterId, name: Option<&'a str>) -> Self {
        Self { cluster_id, name }
    }
}

#[derive(Debug, Clone)]
struct PreparedGroup {
    canonical: String,
    group: CanonicalGroup,
}

#[derive(Debug)]
pub struct GroupMatcher {
    canon: Canonicalizer,
    groups: Vec<CanonicalGroup>,
    /// Canonical group names, computed on first use.
    prepared: OnceLock<Vec<PreparedGroup>>,
    threshold: f64,
    chunk_size: usize,
}

impl GroupMatcher {
    /// An empty reference list is a configuration failure.
    pub fn new(canon: Canonicalizer, groups: Vec<CanonicalGroup>, config: &MatchingConfig) -> Result<Self> {
        if groups.is_empty() {
            return Err(ReconError::configuration_missing("reference list", "no canonical groups"));
        }
        if config.chunk_size == 0 {
            return Err(ReconError::InvalidConfig("chunk_size must be positive".into()));
        }
        Ok(Self {
            canon,
            groups,
            prepared: OnceLock::new(),
            threshold: config.acceptance_threshold,
            chunk_size: config.chunk_size,
        })
    }

    pub fn groups(&self) -> &[CanonicalGroup] {
        &self.groups
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn prepared(&self) -> &[PreparedGroup] {
        self.prepared.get_or_init(|| {
            tracing::debug!(groups = self.groups.len(), "canonicalizing reference names");
            self.groups
                .iter()
                .map(|g| PreparedGroup { canonical: self.canon.canonicalize_str(&g.name).to_lowercase(), group: g.clone() })
                .collect()
        })
    }

    /// Score a raw name against every group. The highest score wins, the
    /// earliest group on ties; accepted only at or above the threshold.
    pub fn best_match(&self, cluster_id: ClusterId, name: Option<&str>) -> GroupAssignment {
        let canonical = self.canon.canonicalize(name).map(|n| n.to_lowercase()).unwrap_or_default();
        if canonical.trim().is_empty() {
            return GroupAssignment { cluster_id, group: MatchedGroup::NoMatch, score: 0.0, matched_name: None };
        }

        let mut best: Option<(&PreparedGroup, f64)> = None;
        for candidate in self.prepared() {
            let score = similarity::token_sort_ratio(&canonical, &candidate.canonical);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((candidate, score));
            }
        }

        match best {
            Some((candidate, score)) if score >= self.threshold => GroupAssignment {
                cluster_id,
                group: MatchedGroup::Group(candidate.group.group.clone()),
                score,
                matched_name: Some(candidate.group.name.clone()),
            },
            Some((candidate, score)) => GroupAssignment {
                cluster_id,
                group: MatchedGroup::NoMatch,
                score,
                matched_name: Some(candidate.group.name.clone()),
            },
            None => GroupAssignment { cluster_id, group: MatchedGroup::NoMatch, score: 0.0, matched_name: None },
        }
    }

    /// Assign one chunk. Clusters already decided in `ctx` are not re-scored;
    /// new clusters are decided by their first member in the chunk.
    pub fn match_chunk(&self, chunk: &[MatchInput<'_>], ctx: &mut MatchContext) -> Vec<MatchedGroup> {
        let mut scored = 0usize;
        for input in chunk {
            if !ctx.contains(input.cluster_id) {
                scored += 1;
                ctx.get_or_assign(input.cluster_id, || self.best_match(input.cluster_id, input.name));
            }
        }
        tracing::debug!(rows = chunk.len(), new_clusters = scored, "matched chunk");
        chunk
            .iter()
            .map(|input| {
                ctx.get(input.cluster_id)
                    .map(|a| a.group.clone())
                    .unwrap_or(MatchedGroup::NoMatch)
            })
            .collect()
    }

    /// Process a row stream in chunks of the configured size. At most one
    /// chunk of inputs is buffered, so `inputs` can be a lazy reader.
    pub fn match_stream<'a, I>(&self, inputs: I, ctx: &mut MatchContext) -> Vec<MatchedGroup>
    where
        I: IntoIterator<Item = MatchInput<'a>>,
    {
        let mut out = Vec::new();
        let mut chunk = Vec::with_capacity(self.chunk_size);
        let mut rows = 0usize;
        for input in inputs {
            chunk.push(input);
            if chunk.len() == self.chunk_size {
                rows += chunk.len();
                out.extend(self.match_chunk(&chunk, ctx));
                chunk.clear();
            }
        }
        if !chunk.is_empty() {
            rows += chunk.len();
            out.extend(self.match_chunk(&chunk, ctx));
        }
        tracing::info!(
            run = %ctx.run_id(),
            rows,
            clusters = ctx.len(),
            matched = ctx.matched_count(),
            "group matching done"
        );
        out
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ReconError::InvalidConfig("chunk_size must be positive".into()));
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }
}
