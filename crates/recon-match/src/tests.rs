use crate::*;
use recon_canon::Canonicalizer;
use recon_core::{CanonicalGroup, ClusterId, GroupAssignment, MatchedGroup, MatchingConfig, ReconError, ReferenceSchemaConfig, Stage};
use serde_json::json;
use uuid::Uuid;

fn matcher(groups: &[(&str, &str)]) -> GroupMatcher {
    let groups = groups.iter().map(|(n, g)| CanonicalGroup::new(*n, *g)).collect();
    GroupMatcher::new(Canonicalizer::builtin().unwrap(), groups, &MatchingConfig::default()).unwrap()
}

fn rows(values: serde_json::Value) -> Vec<serde_json::Map<String, serde_json::Value>> {
    values.as_array().unwrap().iter().map(|v| v.as_object().cloned().unwrap()).collect()
}

// ========== Scoring ==========

#[test]
fn test_score_of_85_is_accepted() {
    let m = matcher(&[("abcdefghijklmnopqxyz", "G85")]);
    let a = m.best_match(ClusterId(0), Some("abcdefghijklmnopqrst"));
    assert_eq!(a.score, 85.0);
    assert_eq!(a.group, MatchedGroup::Group("G85".into()));
    assert_eq!(a.matched_name.as_deref(), Some("abcdefghijklmnopqxyz"));
}

#[test]
fn test_score_of_84_is_no_match() {
    let m = matcher(&[("abcdefghijklmnopqrstu1234", "G84")]);
    let a = m.best_match(ClusterId(0), Some("abcdefghijklmnopqrstuvwxy"));
    assert_eq!(a.score, 84.0);
    assert_eq!(a.group, MatchedGroup::NoMatch);
}

#[test]
fn test_token_order_does_not_matter() {
    let m = matcher(&[("STEEL GULF", "Gulf Steel Group")]);
    let a = m.best_match(ClusterId(0), Some("GULF STEEL"));
    assert_eq!(a.score, 100.0);
    assert!(a.group.is_match());
}

#[test]
fn test_names_are_canonicalized_before_scoring() {
    let m = matcher(&[("Acme Trading", "Acme Group")]);
    let a = m.best_match(ClusterId(0), Some("ACME TRADING L.L.C c/o John"));
    assert_eq!(a.score, 100.0);
    assert_eq!(a.group, MatchedGroup::Group("Acme Group".into()));
}

#[test]
fn test_tie_goes_to_first_group() {
    let m = matcher(&[("ACME", "first"), ("ACME", "second")]);
    let a = m.best_match(ClusterId(0), Some("acme"));
    assert_eq!(a.group, MatchedGroup::Group("first".into()));
}

#[test]
fn test_best_group_wins() {
    let m = matcher(&[("ZETA FOODS", "zeta"), ("GULF STEEL", "gulf"), ("GULF STEEL CO", "gulf co")]);
    let a = m.best_match(ClusterId(0), Some("GULF STEEL"));
    assert_eq!(a.group, MatchedGroup::Group("gulf".into()));
}

#[test]
fn test_missing_or_empty_name_is_no_match() {
    let m = matcher(&[("ACME", "acme")]);
    for name in [None, Some(""), Some("   "), Some(" LLC")] {
        let a = m.best_match(ClusterId(3), name);
        assert_eq!(a.group, MatchedGroup::NoMatch);
        assert_eq!(a.score, 0.0);
    }
}

#[test]
fn test_empty_reference_list_is_configuration_missing() {
    let err = GroupMatcher::new(Canonicalizer::trim_only(), Vec::new(), &MatchingConfig::default()).unwrap_err();
    assert!(matches!(err, ReconError::ConfigurationMissing { .. }));
}

// ========== Streaming ==========

#[test]
fn test_cluster_decided_by_first_member() {
    let m = matcher(&[("ACME", "acme"), ("ZETA", "zeta")]);
    let inputs = [
        MatchInput::new(ClusterId(0), Some("ACME")),
        MatchInput::new(ClusterId(0), Some("ZETA")),
        MatchInput::new(ClusterId(1), Some("NOTHING ALIKE")),
    ];
    let mut ctx = MatchContext::new();
    let out = m.match_stream(inputs, &mut ctx);
    assert_eq!(
        out,
        vec![MatchedGroup::Group("acme".into()), MatchedGroup::Group("acme".into()), MatchedGroup::NoMatch]
    );
    assert_eq!(ctx.len(), 2);
    assert_eq!(ctx.matched_count(), 1);
    assert_eq!(ctx.unmatched_count(), 1);
}

#[test]
fn test_cache_survives_across_chunks() {
    let m = matcher(&[("ACME", "acme"), ("ZETA", "zeta")]).with_chunk_size(1).unwrap();
    let inputs = [MatchInput::new(ClusterId(0), Some("ACME")), MatchInput::new(ClusterId(0), Some("ZETA"))];
    let mut ctx = MatchContext::new();
    let out = m.match_stream(inputs, &mut ctx);
    assert_eq!(out[1], MatchedGroup::Group("acme".into()));
}

#[test]
fn test_result_independent_of_chunk_size() {
    let groups = [("ACME", "acme"), ("ZETA FOODS", "zeta"), ("GULF STEEL", "gulf")];
    let names = ["ZETA FOODS", "ACME", "GULF STEEL", "ZETA", "ACME CO", "OTHER", "GULF"];
    let clusters = [0, 1, 2, 0, 1, 3, 2];
    let inputs: Vec<MatchInput> = names
        .iter()
        .zip(clusters)
        .map(|(n, c)| MatchInput::new(ClusterId(c), Some(*n)))
        .collect();

    let baseline = matcher(&groups).match_stream(inputs.iter().copied(), &mut MatchContext::new());
    for size in [1, 2, 3, 1000] {
        let m = matcher(&groups).with_chunk_size(size).unwrap();
        assert_eq!(m.match_stream(inputs.iter().copied(), &mut MatchContext::new()), baseline, "chunk size {size}");
    }
}

#[test]
fn test_lazy_stream_is_consumed_chunk_by_chunk() {
    let groups = [("ACME", "acme"), ("ZETA FOODS", "zeta")];
    let names = ["ACME", "ZETA FOODS", "OTHER"];
    let stream = || (0..10).map(move |i| MatchInput::new(ClusterId(i % 4), Some(names[i % 3])));

    let mut ctx = MatchContext::new();
    let out = matcher(&groups).with_chunk_size(3).unwrap().match_stream(stream(), &mut ctx);
    assert_eq!(out.len(), 10);
    assert_eq!(ctx.len(), 4);
    // cluster 3 is first seen with "ACME" (row 3) and keeps that group at row 7
    assert_eq!(out[3], MatchedGroup::Group("acme".into()));
    assert_eq!(out[7], MatchedGroup::Group("acme".into()));
    for size in [1, 4, 1000] {
        let m = matcher(&groups).with_chunk_size(size).unwrap();
        assert_eq!(m.match_stream(stream(), &mut MatchContext::new()), out, "chunk size {size}");
    }
}

#[test]
fn test_empty_stream() {
    let mut ctx = MatchContext::new();
    assert!(matcher(&[("ACME", "acme")]).match_stream(std::iter::empty(), &mut ctx).is_empty());
    assert!(ctx.is_empty());
}

#[test]
fn test_zero_chunk_size_rejected() {
    assert!(matches!(matcher(&[("A", "a")]).with_chunk_size(0), Err(ReconError::InvalidConfig(_))));
}

// ========== Context ==========

#[test]
fn test_context_never_overwrites() {
    let mut ctx = MatchContext::with_run_id(Uuid::nil());
    let first = GroupAssignment { cluster_id: ClusterId(1), group: MatchedGroup::Group("a".into()), score: 90.0, matched_name: None };
    let second = GroupAssignment { cluster_id: ClusterId(1), group: MatchedGroup::NoMatch, score: 0.0, matched_name: None };
    ctx.get_or_assign(ClusterId(1), || first.clone());
    let kept = ctx.get_or_assign(ClusterId(1), || second.clone()).clone();
    assert_eq!(kept, first);
    assert_eq!(ctx.run_id(), Uuid::nil());
}

#[test]
fn test_context_assignment_order() {
    let mut ctx = MatchContext::new();
    for id in [5, 2, 9] {
        ctx.get_or_assign(ClusterId(id), || GroupAssignment {
            cluster_id: ClusterId(id),
            group: MatchedGroup::NoMatch,
            score: 0.0,
            matched_name: None,
        });
    }
    let order: Vec<ClusterId> = ctx.assignments().map(|a| a.cluster_id).collect();
    assert_eq!(order, vec![ClusterId(5), ClusterId(2), ClusterId(9)]);
}

#[test]
fn test_separate_contexts_do_not_share_state() {
    let m = matcher(&[("ACME", "acme")]);
    let mut a = MatchContext::new();
    let mut b = MatchContext::new();
    m.match_stream([MatchInput::new(ClusterId(0), Some("ACME"))], &mut a);
    m.match_stream([MatchInput::new(ClusterId(0), Some("OTHER"))], &mut b);
    assert!(a.get(ClusterId(0)).unwrap().group.is_match());
    assert!(!b.get(ClusterId(0)).unwrap().group.is_match());
    assert_ne!(a.run_id(), b.run_id());
}

// ========== Reference list ==========

#[test]
fn test_reference_from_rows() {
    let data = rows(json!([
        {"INSURED_RI": "Acme Trading", "SAM_GROUP_NAME": "Acme Group"},
        {"INSURED_RI": null, "SAM_GROUP_NAME": "Orphan"},
        {"INSURED_RI": " Zeta ", "SAM_GROUP_NAME": "Zeta Group"}
    ]));
    let groups = reference_from_rows(&data, &ReferenceSchemaConfig::default()).unwrap();
    assert_eq!(groups, vec![CanonicalGroup::new("Acme Trading", "Acme Group"), CanonicalGroup::new("Zeta", "Zeta Group")]);
}

#[test]
fn test_reference_missing_column() {
    let data = rows(json!([
        {"INSURED_RI": "Acme", "SAM_GROUP_NAME": "Acme Group"},
        {"INSURED_RI": "Zeta"}
    ]));
    match reference_from_rows(&data, &ReferenceSchemaConfig::default()) {
        Err(ReconError::SchemaMismatch { stage, column, row }) => {
            assert_eq!(stage, Stage::GroupMatch);
            assert_eq!(column, "SAM_GROUP_NAME");
            assert_eq!(row, 1);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_reference_without_usable_rows() {
    let data = rows(json!([{"INSURED_RI": null, "SAM_GROUP_NAME": "x"}]));
    let err = reference_from_rows(&data, &ReferenceSchemaConfig::default()).unwrap_err();
    assert!(matches!(err, ReconError::ConfigurationMissing { .. }));
}

#[test]
fn test_dedup_reference_keeps_first() {
    let groups = vec![
        CanonicalGroup::new("Acme", "A"),
        CanonicalGroup::new("Acme", "B"),
        CanonicalGroup::new("Acme", "A"),
    ];
    assert_eq!(dedup_reference(groups), vec![CanonicalGroup::new("Acme", "A"), CanonicalGroup::new("Acme", "B")]);
}
