//! Per-run cache of cluster-to-group decisions.

use chrono::{DateTime, Utc};
use recon_core::{ClusterId, GroupAssignment};
use std::collections::HashMap;
use uuid::Uuid;

/// Scoped to one matching run. An assignment, once made, is never replaced.
#[derive(Debug, Clone)]
pub struct MatchContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    assignments: HashMap<ClusterId, GroupAssignment>,
    /// Clusters in the order they were first assigned.
    order: Vec<ClusterId>,
}

impl Default for MatchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchContext {
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4())
    }

    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            assignments: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn get(&self, cluster_id: ClusterId) -> Option<&GroupAssignment> {
        self.assignments.get(&cluster_id)
    }

    pub fn contains(&self, cluster_id: ClusterId) -> bool {
        self.assignments.contains_key(&cluster_id)
    }

    /// Cached assignment, or the result of `decide` stored for the rest of the run.
    pub fn get_or_assign<F>(&mut self, cluster_id: ClusterId, decide: F) -> &GroupAssignment
    where
        F: FnOnce() -> GroupAssignment,
    {
        let order = &mut self.order;
        self.assignments.entry(cluster_id).or_insert_with(|| {
            order.push(cluster_id);
            decide()
        })
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Assignments in first-assigned order.
    pub fn assignments(&self) -> impl Iterator<Item = &GroupAssignment> + '_ {
        self.order.iter().filter_map(|id| self.assignments.get(id))
    }

    pub fn matched_count(&self) -> usize {
        self.assignments.values().filter(|a| a.group.is_match()).count()
    }

    pub fn unmatched_count(&self) -> usize {
        self.len() - self.matched_count()
    }
}
