//! Stage orchestration for one reconciliation run.

use crate::io::{self, Row};
use crate::progress::{ProgressReporter, TracingProgress};
use crate::report::{Resolution, ResolvedRow, RunReport};
use chrono::Utc;
use recon_canon::Canonicalizer;
use recon_cluster::confidence::classify_clusters;
use recon_cluster::representative::{join_representatives, select_representatives};
use recon_cluster::{ClusterOutput, Clusterer, LabelSource, Labeler, MatchField, NoLabeler, TrainingData};
use recon_core::{
    CanonicalGroup, CanonicalRecord, ClusterId, ConfidenceTier, MatchedGroup, ReconConfig, Record, Representative,
    Result, Stage, NAME_FIELD,
};
use recon_match::{dedup_reference, reference_from_rows, GroupMatcher, MatchContext, MatchInput};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Identifier key under which reference entries expose their group label
/// during consolidation.
pub const GROUP_FIELD: &str = "group";

/// Loaded, filtered and canonicalized records.
#[derive(Debug, Clone)]
pub struct Canonicalized {
    pub records: Vec<CanonicalRecord>,
    pub input_rows: usize,
    pub excluded: usize,
}

pub struct ReconPipeline {
    config: ReconConfig,
    canon: Canonicalizer,
    progress: Box<dyn ProgressReporter>,
}

impl ReconPipeline {
    /// Validates the config and loads the noise list once for the run.
    pub fn new(config: ReconConfig) -> Result<Self> {
        config.validate()?;
        let canon = Canonicalizer::from_config(&config.canon)?;
        Ok(Self::with_canonicalizer(config, canon))
    }

    pub fn with_canonicalizer(config: ReconConfig, canon: Canonicalizer) -> Self {
        Self { config, canon, progress: Box::new(TracingProgress) }
    }

    pub fn with_progress(mut self, progress: impl ProgressReporter + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canon
    }

    /// Canonical name compared fuzzily, every identifier column compared exactly.
    pub fn match_fields(&self) -> Vec<MatchField> {
        std::iter::once(MatchField::text(NAME_FIELD))
            .chain(self.config.schema.identifier_columns.iter().map(MatchField::exact))
            .collect()
    }

    fn is_excluded(&self, name: Option<&str>) -> bool {
        let Some(name) = name else { return false };
        let upper = name.to_uppercase();
        self.config
            .schema
            .exclude_name_markers
            .iter()
            .any(|m| !m.is_empty() && upper.contains(&m.to_uppercase()))
    }

    pub fn canonicalize_rows(&self, rows: &[Row]) -> Result<Canonicalized> {
        self.progress.stage_started(Stage::Canonicalize);
        let mut records = Vec::with_capacity(rows.len());
        let mut excluded = 0usize;
        for (i, row) in rows.iter().enumerate() {
            let record = Record::from_row(i, row, &self.config.schema)?;
            if self.is_excluded(record.name.as_deref()) {
                excluded += 1;
                continue;
            }
            let canonical_name = self.canon.canonicalize(record.name.as_deref());
            records.push(CanonicalRecord { record, canonical_name });
        }
        if excluded > 0 {
            tracing::info!(excluded, "rows dropped by name markers");
        }
        self.progress.stage_finished(Stage::Canonicalize, records.len());
        Ok(Canonicalized { records, input_rows: rows.len(), excluded })
    }

    pub fn cluster(&self, records: &[CanonicalRecord], training: &TrainingData, labeler: &mut dyn Labeler) -> ClusterOutput {
        self.progress.stage_started(Stage::Cluster);
        let clusterer = Clusterer::new(self.config.learning.clone(), self.match_fields());
        let output = clusterer.cluster(records, training, labeler);
        self.progress.stage_finished(Stage::Cluster, output.clusters.len());
        output
    }

    /// Tier per cluster, indexed by cluster id.
    pub fn annotate_confidence(&self, output: &ClusterOutput) -> Vec<ConfidenceTier> {
        self.progress.stage_started(Stage::Confidence);
        let tiers = classify_clusters(&output.clusters);
        self.progress.stage_finished(Stage::Confidence, tiers.len());
        tiers
    }

    pub fn select_representatives(
        &self,
        records: &[CanonicalRecord],
        output: &ClusterOutput,
    ) -> BTreeMap<ClusterId, Representative> {
        self.progress.stage_started(Stage::Representative);
        let reps = select_representatives(records, &output.clusters, &self.config.schema.representative_column);
        self.progress.stage_finished(Stage::Representative, reps.len());
        reps
    }

    /// Group per record, in record order. Decisions land in `ctx`.
    pub fn match_groups(
        &self,
        records: &[CanonicalRecord],
        output: &ClusterOutput,
        groups: Vec<CanonicalGroup>,
        ctx: &mut MatchContext,
    ) -> Result<Vec<MatchedGroup>> {
        self.progress.stage_started(Stage::GroupMatch);
        let matcher = GroupMatcher::new(self.canon.clone(), dedup_reference(groups), &self.config.matching)?;
        let inputs = records
            .iter()
            .zip(&output.assignments)
            .map(|(r, id)| MatchInput::new(*id, r.record.name.as_deref()));
        let matched = matcher.match_stream(inputs, ctx);
        self.progress.stage_finished(Stage::GroupMatch, ctx.len());
        Ok(matched)
    }

    /// Collapse reference entries that cluster together and carry the same
    /// group label, keeping the first of each. Model-only; nobody is asked.
    pub fn consolidate_reference(&self, groups: Vec<CanonicalGroup>) -> Vec<CanonicalGroup> {
        self.progress.stage_started(Stage::ReferenceConsolidation);
        let groups = dedup_reference(groups);
        let before = groups.len();
        if before < 2 {
            self.progress.stage_finished(Stage::ReferenceConsolidation, before);
            return groups;
        }
        let records: Vec<CanonicalRecord> = groups
            .iter()
            .enumerate()
            .map(|(i, g)| CanonicalRecord {
                record: Record::new(i, Some(&g.name)).with_identifier(GROUP_FIELD, g.group.clone()),
                canonical_name: Some(self.canon.canonicalize_str(&g.name)),
            })
            .collect();
        let fields = vec![MatchField::text(NAME_FIELD), MatchField::exact(GROUP_FIELD)];
        let output = Clusterer::new(self.config.learning.clone(), fields).cluster(
            &records,
            &TrainingData::default(),
            &mut NoLabeler,
        );

        let mut seen = HashSet::new();
        let kept: Vec<CanonicalGroup> = groups
            .into_iter()
            .zip(&output.assignments)
            .filter(|(g, id)| seen.insert((**id, g.group.clone())))
            .map(|(g, _)| g)
            .collect();
        tracing::info!(before, after = kept.len(), "reference list consolidated");
        self.progress.stage_finished(Stage::ReferenceConsolidation, kept.len());
        kept
    }

    /// Full run. Load and canonicalization failures abort; a group-matching
    /// failure (including an unusable reference list) is returned inside the
    /// [`Resolution`] alongside the clustered rows.
    pub fn run(
        &self,
        rows: &[Row],
        reference: &[Row],
        training: &TrainingData,
        labeler: &mut dyn Labeler,
    ) -> Result<Resolution> {
        let groups = reference_from_rows(reference, &self.config.reference);
        self.resolve(rows, groups, training, labeler)
    }

    /// [`run`](Self::run) with the reference list already prepared, or the
    /// error that prevented preparing it.
    pub fn resolve(
        &self,
        rows: &[Row],
        groups: Result<Vec<CanonicalGroup>>,
        training: &TrainingData,
        labeler: &mut dyn Labeler,
    ) -> Result<Resolution> {
        let started_at = Utc::now();
        let mut ctx = MatchContext::new();
        tracing::info!(run = %ctx.run_id(), rows = rows.len(), "reconciliation started");

        let canonical = self.canonicalize_rows(rows)?;
        let records = &canonical.records;
        let clusters = self.cluster(records, training, labeler);
        let tiers = self.annotate_confidence(&clusters);
        let representatives = join_representatives(&clusters.assignments, &self.select_representatives(records, &clusters));

        let (matched, failure) = match groups.and_then(|g| self.match_groups(records, &clusters, g, &mut ctx)) {
            Ok(matched) => (Some(matched), None),
            Err(err) => {
                let err = err.in_stage(Stage::GroupMatch, "cross-dataset group matching");
                tracing::error!(run = %ctx.run_id(), error = %err, "group matching failed, keeping cluster annotations");
                (None, Some(err))
            }
        };

        let no_match = &self.config.matching.no_match_label;
        let mut resolved: Vec<ResolvedRow> = records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let id = clusters.assignments[i];
                ResolvedRow {
                    attributes: ResolvedRow::passthrough(r.record.attributes.clone()),
                    canonical_name: r.canonical_name.clone(),
                    cluster_id: id,
                    confidence: clusters.clusters[id.0].score,
                    confidence_level: tiers[id.0],
                    most_frequent_identifier: representatives[i].clone(),
                    matched_group: matched.as_ref().map(|m| m[i].label(no_match).to_string()),
                }
            })
            .collect();
        resolved.sort_by_key(|r| r.cluster_id);

        let mut tier_counts = BTreeMap::new();
        for tier in &tiers {
            *tier_counts.entry(*tier).or_insert(0) += 1;
        }
        let report = RunReport {
            run_id: ctx.run_id(),
            started_at,
            finished_at: Utc::now(),
            input_rows: canonical.input_rows,
            excluded_rows: canonical.excluded,
            records: records.len(),
            clusters: clusters.clusters.len(),
            singleton_clusters: clusters.clusters.iter().filter(|c| c.is_singleton()).count(),
            candidate_pairs: clusters.blocking.pairs,
            linked_pairs: clusters.linked_pairs,
            labels_requested: clusters.requested,
            human_labels: clusters.labels.iter().filter(|l| l.source == LabelSource::Human).count(),
            abstentions: clusters.abstentions,
            learning_stop: clusters.stop,
            tiers: tier_counts,
            matched_clusters: ctx.matched_count(),
            unmatched_clusters: ctx.unmatched_count(),
            failed_stage: failure.as_ref().and_then(|e| e.stage()),
        };
        tracing::info!(
            run = %report.run_id,
            records = report.records,
            clusters = report.clusters,
            matched = report.matched_clusters,
            elapsed_ms = report.duration().num_milliseconds(),
            "reconciliation finished"
        );

        let training = clusters.training_data(records, &self.match_fields());
        Ok(Resolution { rows: resolved, report, training, failure })
    }

    /// File-to-file run: JSONL records and reference list in, JSONL rows out.
    pub fn run_files(
        &self,
        input: &Path,
        reference: &Path,
        output: &Path,
        training: &TrainingData,
        labeler: &mut dyn Labeler,
    ) -> anyhow::Result<Resolution> {
        use anyhow::Context;

        let rows = io::read_jsonl(input).with_context(|| format!("reading records from {}", input.display()))?;
        let groups = io::read_reference(reference).and_then(|r| reference_from_rows(&r, &self.config.reference));
        let resolution = self.resolve(&rows, groups, training, labeler)?;
        io::write_jsonl(output, &resolution.rows).with_context(|| format!("writing {}", output.display()))?;
        Ok(resolution)
    }
}
