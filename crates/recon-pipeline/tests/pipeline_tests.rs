//! End-to-end runs of the reconciliation pipeline.

use recon_canon::Canonicalizer;
use recon_cluster::{FnLabeler, LabelRequest, LabelResponse, NoLabeler, StopReason, TrainingData};
use recon_core::{ClusterId, ConfidenceTier, MissingNoiseListPolicy, ReconConfig, ReconError, Stage};
use recon_pipeline::io::{read_jsonl, write_jsonl, Row};
use recon_pipeline::{ProgressReporter, ReconPipeline};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn rows(values: serde_json::Value) -> Vec<Row> {
    values.as_array().unwrap().iter().map(|v| v.as_object().cloned().unwrap()).collect()
}

fn customers() -> Vec<Row> {
    rows(json!([
        {"CUSTOMER_NAME": "ACME TRADING L.L.C", "XOFPARTY_ID": "100", "TAX_REG_NUMBER": null},
        {"CUSTOMER_NAME": "Acme Trading LLC", "XOFPARTY_ID": "100", "TAX_REG_NUMBER": null},
        {"CUSTOMER_NAME": "ACME TRADING", "XOFPARTY_ID": "101", "TAX_REG_NUMBER": null},
        {"CUSTOMER_NAME": "CASH CUSTOMERS DUBAI", "XOFPARTY_ID": "1", "TAX_REG_NUMBER": null},
        {"CUSTOMER_NAME": "Tokio Marine & Nichido", "XOFPARTY_ID": "200", "TAX_REG_NUMBER": null},
        {"CUSTOMER_NAME": "ZETA FOODS", "XOFPARTY_ID": "300", "TAX_REG_NUMBER": null}
    ]))
}

fn reference() -> Vec<Row> {
    rows(json!([
        {"INSURED_RI": "Acme Trading Co. c/o Someone", "SAM_GROUP_NAME": "ACME GROUP"},
        {"INSURED_RI": "TOKIO MARINE", "SAM_GROUP_NAME": "TOKIO MARINE GROUP"}
    ]))
}

fn pipeline(config: ReconConfig) -> ReconPipeline {
    ReconPipeline::with_canonicalizer(config, Canonicalizer::builtin().unwrap())
}

/// Answers by comparing the party ids of the two sides.
fn id_oracle(request: &LabelRequest) -> LabelResponse {
    if request.left.get("XOFPARTY_ID") == request.right.get("XOFPARTY_ID") {
        LabelResponse::Match
    } else {
        LabelResponse::NoMatch
    }
}

#[derive(Clone, Default)]
struct RecordingProgress(Arc<Mutex<Vec<(Stage, bool)>>>);

impl ProgressReporter for RecordingProgress {
    fn stage_started(&self, stage: Stage) {
        self.0.lock().unwrap().push((stage, false));
    }

    fn stage_finished(&self, stage: Stage, _items: usize) {
        self.0.lock().unwrap().push((stage, true));
    }
}

// ============================================================
// Full runs
// ============================================================

#[test]
fn test_model_only_run() {
    let resolution = pipeline(ReconConfig::default())
        .run(&customers(), &reference(), &TrainingData::default(), &mut NoLabeler)
        .unwrap();
    assert!(resolution.is_complete());

    let report = &resolution.report;
    assert_eq!(report.input_rows, 6);
    assert_eq!(report.excluded_rows, 1);
    assert_eq!(report.records, 5);
    assert_eq!(report.clusters, 3);
    assert_eq!(report.candidate_pairs, 3);
    assert_eq!(report.learning_stop, StopReason::Finished);
    assert_eq!(report.labels_requested, 0);
    assert_eq!(report.matched_clusters, 2);
    assert_eq!(report.unmatched_clusters, 1);
    assert_eq!(report.tiers.get(&ConfidenceTier::High), Some(&3));
    assert!(report.failed_stage.is_none());

    let rows = &resolution.rows;
    assert_eq!(rows.len(), 5);
    let ids: Vec<ClusterId> = rows.iter().map(|r| r.cluster_id).collect();
    assert_eq!(ids, vec![ClusterId(0), ClusterId(0), ClusterId(0), ClusterId(1), ClusterId(2)]);

    for acme in &rows[..3] {
        assert_eq!(acme.canonical_name.as_deref().map(str::to_uppercase), Some("ACME TRADING".into()));
        assert_eq!(acme.most_frequent_identifier.as_deref(), Some("100"));
        assert_eq!(acme.matched_group.as_deref(), Some("ACME GROUP"));
        assert_eq!(acme.confidence_level, ConfidenceTier::High);
    }
    assert_eq!(rows[3].canonical_name.as_deref(), Some("Tokio Marines"));
    assert_eq!(rows[3].matched_group.as_deref(), Some("TOKIO MARINE GROUP"));
    assert_eq!(rows[4].matched_group.as_deref(), Some("No Match"));
    assert_eq!(rows[4].confidence, 1.0);
}

#[test]
fn test_human_labels_split_cluster_and_seed_next_run() {
    let mut config = ReconConfig::default();
    config.learning.labeling_budget_fraction = 1.0;
    let pipeline = pipeline(config);

    let first = pipeline
        .run(&customers(), &reference(), &TrainingData::default(), &mut FnLabeler(id_oracle))
        .unwrap();
    assert_eq!(first.report.human_labels, 3);
    assert_eq!(first.report.labels_requested, 3);
    assert_eq!(first.report.learning_stop, StopReason::BudgetExhausted);
    assert_eq!(first.report.clusters, 4);
    assert_eq!(first.rows[0].cluster_id, first.rows[1].cluster_id);
    assert_ne!(first.rows[1].cluster_id, first.rows[2].cluster_id);
    assert_eq!(first.rows[2].matched_group.as_deref(), Some("ACME GROUP"));
    assert_eq!(first.training.matches.len(), 1);
    assert_eq!(first.training.distinct.len(), 2);

    let mut never = FnLabeler(|_: &LabelRequest| -> LabelResponse { panic!("labeled pair asked again") });
    let second = pipeline.run(&customers(), &reference(), &first.training, &mut never).unwrap();
    assert_eq!(second.report.labels_requested, 0);
    assert_eq!(second.report.learning_stop, StopReason::PoolExhausted);
    let ids = |r: &recon_pipeline::Resolution| r.rows.iter().map(|row| row.cluster_id).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn test_every_record_in_one_cluster() {
    let resolution = pipeline(ReconConfig::default())
        .run(&customers(), &reference(), &TrainingData::default(), &mut NoLabeler)
        .unwrap();
    let mut rows: Vec<usize> = resolution
        .rows
        .iter()
        .map(|r| r.attributes["XOFPARTY_ID"].as_str().unwrap().parse().unwrap())
        .collect();
    rows.sort();
    assert_eq!(rows, vec![100, 100, 101, 200, 300]);
}

#[test]
fn test_group_matching_failure_keeps_cluster_annotations() {
    let resolution = pipeline(ReconConfig::default())
        .run(&customers(), &[], &TrainingData::default(), &mut NoLabeler)
        .unwrap();
    assert!(!resolution.is_complete());
    assert_eq!(resolution.report.failed_stage, Some(Stage::GroupMatch));
    assert!(resolution.rows.iter().all(|r| r.matched_group.is_none()));
    assert_eq!(resolution.rows[0].most_frequent_identifier.as_deref(), Some("100"));

    match resolution.failure {
        Some(ReconError::Stage { stage, source, .. }) => {
            assert_eq!(stage, Stage::GroupMatch);
            assert!(matches!(*source, ReconError::ConfigurationMissing { .. }));
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[test]
fn test_missing_column_aborts_run() {
    let mut input = customers();
    input[2].remove("TAX_REG_NUMBER");
    let err = pipeline(ReconConfig::default())
        .run(&input, &reference(), &TrainingData::default(), &mut NoLabeler)
        .unwrap_err();
    match err {
        ReconError::SchemaMismatch { column, row, .. } => {
            assert_eq!(column, "TAX_REG_NUMBER");
            assert_eq!(row, 2);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_progress_reports_each_stage_in_order() {
    let progress = RecordingProgress::default();
    pipeline(ReconConfig::default())
        .with_progress(progress.clone())
        .run(&customers(), &reference(), &TrainingData::default(), &mut NoLabeler)
        .unwrap();
    let events = progress.0.lock().unwrap().clone();
    let started: Vec<Stage> = events.iter().filter(|(_, done)| !done).map(|(s, _)| *s).collect();
    assert_eq!(
        started,
        vec![Stage::Canonicalize, Stage::Cluster, Stage::Confidence, Stage::Representative, Stage::GroupMatch]
    );
    assert_eq!(events.len(), 10);
}

// ============================================================
// Configuration
// ============================================================

#[test]
fn test_missing_noise_list_fails_by_default() {
    let dir = TempDir::new().unwrap();
    let mut config = ReconConfig::default();
    config.canon.noise_list_path = Some(dir.path().join("missing.txt"));
    let err = ReconPipeline::new(config).err().unwrap();
    assert!(matches!(err, ReconError::ConfigurationMissing { .. }));
}

#[test]
fn test_missing_noise_list_trim_only_when_configured() {
    let dir = TempDir::new().unwrap();
    let mut config = ReconConfig::default();
    config.canon.noise_list_path = Some(dir.path().join("missing.txt"));
    config.canon.on_missing_noise_list = MissingNoiseListPolicy::TrimOnly;
    let pipeline = ReconPipeline::new(config).unwrap();
    assert_eq!(pipeline.canonicalizer().canonicalize_str("  ACME L.L.C "), "ACME L.L.C");
}

#[test]
fn test_noise_list_file_is_applied() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("noise.txt");
    std::fs::write(&path, "FOODS\n").unwrap();
    let mut config = ReconConfig::default();
    config.canon.noise_list_path = Some(path);
    let pipeline = ReconPipeline::new(config).unwrap();
    assert_eq!(pipeline.canonicalizer().canonicalize_str("ZETA FOODS"), "ZETA");
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = ReconConfig::default();
    config.matching.chunk_size = 0;
    assert!(matches!(ReconPipeline::new(config).err(), Some(ReconError::InvalidConfig(_))));
}

// ============================================================
// Files
// ============================================================

#[test]
fn test_run_files_writes_sorted_jsonl() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("customers.jsonl");
    let reference_path = dir.path().join("reference.jsonl");
    let output = dir.path().join("resolved.jsonl");
    write_jsonl(&input, &customers()).unwrap();
    write_jsonl(&reference_path, &reference()).unwrap();

    let resolution = pipeline(ReconConfig::default())
        .run_files(&input, &reference_path, &output, &TrainingData::default(), &mut NoLabeler)
        .unwrap();
    assert!(resolution.is_complete());

    let written = read_jsonl(&output).unwrap();
    assert_eq!(written.len(), 5);
    let ids: Vec<u64> = written.iter().map(|r| r["cluster_id"].as_u64().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(written[0]["Matched Group"], "ACME GROUP");
    assert_eq!(written[0]["CUSTOMER_NAME"], "ACME TRADING L.L.C");
    assert_eq!(written[4]["Matched Group"], "No Match");
}

#[test]
fn test_run_files_missing_reference_still_writes_clusters() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("customers.jsonl");
    let output = dir.path().join("resolved.jsonl");
    write_jsonl(&input, &customers()).unwrap();

    let resolution = pipeline(ReconConfig::default())
        .run_files(&input, &dir.path().join("nope.jsonl"), &output, &TrainingData::default(), &mut NoLabeler)
        .unwrap();
    assert_eq!(resolution.report.failed_stage, Some(Stage::GroupMatch));

    let written = read_jsonl(&output).unwrap();
    assert_eq!(written.len(), 5);
    assert!(written.iter().all(|r| r.get("Matched Group").is_none() && r.contains_key("cluster_id")));
}

#[test]
fn test_run_files_missing_input_is_error() {
    let dir = TempDir::new().unwrap();
    let err = pipeline(ReconConfig::default())
        .run_files(
            &dir.path().join("absent.jsonl"),
            &dir.path().join("reference.jsonl"),
            &dir.path().join("out.jsonl"),
            &TrainingData::default(),
            &mut NoLabeler,
        )
        .unwrap_err();
    assert!(err.to_string().contains("reading records"));
}
