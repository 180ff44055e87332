//! Integration tests for the run controller against the in-memory repository.
//!
//! All runs use seeded synthetic topic embeddings, never hand-written
//! coordinates. Each test prints the evidence it checked.

use nalgebra::DMatrix;
use semaxis_core::axes::{stage2_axis_count, IcaConfig, Stage1Transform};
use semaxis_core::baseline::BaselineRepository;
use semaxis_core::controller::{RunController, RunMode, RunOptions, RunPlan};
use semaxis_core::linalg::matrix_from_rows;
use semaxis_core::synthetic::{generate_topic_embeddings, TopicEmbeddingSpec};
use semaxis_core::testing::sample_draft;
use semaxis_core::{AxisError, Config, InMemoryBaselineRepository, VersionId};

fn small_config() -> Config {
    let mut config = Config::default();
    config.analysis.k_min = 3;
    config.analysis.k_max = 5;
    config.analysis.explore_restarts = 4;
    config.analysis.final_restarts = 6;
    config
}

fn topics(seed: u64, dim: usize) -> DMatrix<f64> {
    let data = generate_topic_embeddings(&TopicEmbeddingSpec::new(4, 20, dim, seed));
    matrix_from_rows(&data.vectors).unwrap()
}

fn committed(x: &DMatrix<f64>) -> RunController<InMemoryBaselineRepository> {
    let controller = RunController::new(InMemoryBaselineRepository::new(), small_config());
    let options = RunOptions::new("survey", controller.config());
    let plan = controller.plan_run(&options).unwrap();
    controller.execute(&plan, x, &options).unwrap();
    controller
}

// =========================================================================
// Axis transform determinism
// =========================================================================

#[test]
fn test_stage1_apply_reproduces_training_coordinates() {
    let x = topics(11, 24);
    let (transform, coords) = Stage1Transform::fit(&x, 0.9, 6, 42, &IcaConfig::default()).unwrap();
    let applied = transform.apply(&x).unwrap();

    println!("[BEFORE] fit coords {}x{}", coords.nrows(), coords.ncols());
    assert_eq!(applied, coords);
    println!("[VERIFIED] apply(fit(X), X) equals the fit output");
}

// =========================================================================
// First run
// =========================================================================

#[test]
fn test_auto_commit_persists_rank_one_candidate() {
    let x = topics(3, 24);
    let controller = RunController::new(InMemoryBaselineRepository::new(), small_config());
    let options = RunOptions::new("survey", controller.config());
    let plan = controller.plan_run(&options).unwrap();
    assert_eq!(plan, RunPlan::Commit { plan: None });

    let outcome = controller.execute(&plan, &x, &options).unwrap();
    let best = outcome.exploration.as_ref().unwrap().best().unwrap().clone();
    let stored = controller.repository().load_version("survey", None).unwrap();

    assert_eq!(outcome.report.plan, Some(1));
    assert_eq!(stored.version, VersionId::FIRST);
    assert_eq!(stored.stage1.axis_count(), best.d1);
    assert_eq!(stored.centroids.len(), best.k);
    assert!(stored.stage2.axis_count() <= stage2_axis_count(best.k, best.d1));
    assert_eq!(stored.manifest.plan.as_ref().unwrap().chosen, best);
    println!(
        "[VERIFIED] committed d1={} K={} d2={}",
        best.d1,
        best.k,
        stored.stage2.axis_count()
    );
}

#[test]
fn test_explicit_plan_is_committed() {
    let x = topics(3, 24);
    let controller = RunController::new(InMemoryBaselineRepository::new(), small_config());
    let mut options = RunOptions::new("survey", controller.config());
    options.use_plan = Some(2);
    let plan = controller.plan_run(&options).unwrap();
    let outcome = controller.execute(&plan, &x, &options).unwrap();

    let second = outcome.exploration.as_ref().unwrap().candidates[1].clone();
    let stored = controller.repository().load_version("survey", None).unwrap();
    assert_eq!(outcome.report.plan, Some(2));
    assert_eq!(stored.centroids.len(), second.k);
    assert_eq!(stored.manifest.plan.unwrap().rank, 2);
}

#[test]
fn test_candidates_only_writes_nothing() {
    let x = topics(5, 24);
    let controller = RunController::new(InMemoryBaselineRepository::new(), small_config());
    let mut options = RunOptions::new("survey", controller.config());
    options.candidates_only = true;
    let plan = controller.plan_run(&options).unwrap();
    let outcome = controller.execute(&plan, &x, &options).unwrap();

    let shortlist = outcome.shortlist.unwrap();
    assert!(!shortlist.rows.is_empty());
    assert!(shortlist.rows.len() <= 5);
    assert!(shortlist.assignments.iter().all(|a| a.cluster_ids.len() == x.nrows()));
    assert!(outcome.scored.is_none());
    assert!(controller.repository().list_projects_with_history().unwrap().is_empty());
    println!("[VERIFIED] {} shortlist rows, no baseline", shortlist.rows.len());
}

#[test]
fn test_three_rows_two_clusters() {
    let mut config = Config::default();
    config.analysis.k_min = 2;
    config.analysis.k_max = 2;
    let controller = RunController::new(InMemoryBaselineRepository::new(), config);
    let options = RunOptions::new("tiny", controller.config());

    let x = DMatrix::from_row_slice(3, 4, &[
        1.0, 0.2, 0.0, 0.1,
        0.9, 0.1, 0.1, 0.0,
        -1.0, 0.3, 1.2, 0.4,
    ]);
    let plan = controller.plan_run(&options).unwrap();
    let outcome = controller.execute(&plan, &x, &options).unwrap();

    let exploration = outcome.exploration.unwrap();
    assert!(exploration.candidates.iter().all(|c| c.k < 3));
    assert_eq!(outcome.report.k, Some(2));
    assert_eq!(outcome.scored.unwrap().assignment.len(), 3);
    println!("[VERIFIED] n=3 explored {} candidates", exploration.candidates.len());
}

#[test]
fn test_two_rows_is_configuration_error() {
    let controller = RunController::new(InMemoryBaselineRepository::new(), small_config());
    let options = RunOptions::new("tiny", controller.config());
    let x = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    let plan = controller.plan_run(&options).unwrap();
    let err = controller.execute(&plan, &x, &options).unwrap_err();
    assert!(err.is_configuration(), "got {:?}", err);
}

// =========================================================================
// Lock
// =========================================================================

#[test]
fn test_lock_is_idempotent_and_matches_commit() {
    let x = topics(7, 24);
    let controller = RunController::new(InMemoryBaselineRepository::new(), small_config());
    let options = RunOptions::new("survey", controller.config());
    let commit = controller
        .execute(&controller.plan_run(&options).unwrap(), &x, &options)
        .unwrap();

    let plan = controller.plan_run(&options).unwrap();
    assert_eq!(plan.mode(), RunMode::Lock);
    let first = controller.execute(&plan, &x, &options).unwrap().scored.unwrap();
    let second = controller.execute(&plan, &x, &options).unwrap().scored.unwrap();

    assert_eq!(first.assignment, second.assignment);
    assert_eq!(first.assignment.cluster_ids, commit.scored.unwrap().assignment.cluster_ids);
    assert_eq!(controller.repository().list_versions("survey").unwrap().len(), 1);
    println!("[VERIFIED] lock runs agree on {} rows", first.assignment.len());
}

#[test]
fn test_lock_with_changed_dimension_fails() {
    let controller = committed(&topics(7, 24));
    let options = RunOptions::new("survey", controller.config());
    let plan = controller.plan_run(&options).unwrap();

    let err = controller.execute(&plan, &topics(7, 16), &options).unwrap_err();
    match err {
        AxisError::DimensionMismatch { expected, actual } => {
            assert_eq!((expected, actual), (24, 16));
            println!("[VERIFIED] DimensionMismatch expected={} actual={}", expected, actual);
        }
        other => panic!("expected DimensionMismatch, got {:?}", other),
    }
}

#[test]
fn test_other_project_reuses_discovered_baseline() {
    let x = topics(7, 24);
    let controller = committed(&x);
    let options = RunOptions::new("followup", controller.config());
    let plan = controller.plan_run(&options).unwrap();

    let baseline = plan.baseline().unwrap();
    assert_eq!(baseline.project, "survey");
    let outcome = controller.execute(&plan, &x, &options).unwrap();
    assert_eq!(outcome.report.base_project.as_deref(), Some("survey"));
    assert!(controller.repository().list_versions("followup").unwrap().is_empty());
}

// =========================================================================
// Unlock
// =========================================================================

#[test]
fn test_unlock_add_k_zero_keeps_centroid_count_and_records_version() {
    let x = topics(9, 24);
    let controller = committed(&x);
    let k = controller.repository().load_version("survey", None).unwrap().centroids.len();

    let mut options = RunOptions::new("survey", controller.config());
    options.unlock = true;
    options.unlock_q = 0.5;
    options.unlock_add_k = 0;
    let plan = controller.plan_run(&options).unwrap();
    let outcome = controller.execute(&plan, &x, &options).unwrap();

    let latest = controller.repository().load_version("survey", None).unwrap();
    assert_eq!(latest.version, VersionId(2));
    assert_eq!(latest.centroids.len(), k);
    assert!(outcome.report.unlock.as_ref().unwrap().outlier_count > 0);
    assert_eq!(latest.manifest.extended_from.as_deref(), Some("survey:v001"));
    println!("[VERIFIED] add_k=0 kept K={} and wrote {}", k, latest.version);
}

#[test]
fn test_unlock_high_quantile_flags_almost_nothing() {
    let x = topics(9, 24);
    let controller = committed(&x);
    let k = controller.repository().load_version("survey", None).unwrap().centroids.len();

    let mut options = RunOptions::new("survey", controller.config());
    options.unlock = true;
    options.unlock_q = 0.999;
    options.unlock_add_k = 3;
    let plan = controller.plan_run(&options).unwrap();
    let outcome = controller.execute(&plan, &x, &options).unwrap();

    let info = outcome.report.unlock.unwrap();
    assert!(info.outlier_count <= 1, "outliers={}", info.outlier_count);
    let novel = outcome.scored.unwrap().novel.unwrap();
    assert_eq!(novel.iter().filter(|n| **n).count(), info.outlier_count);
    let latest = controller.repository().load_version("survey", None).unwrap();
    assert!(latest.centroids.len() <= k + 1);
}

#[test]
fn test_unlock_preserves_existing_centroids_and_history() {
    let base = topics(9, 24);
    let controller = committed(&base);
    let before = controller.repository().load_version("survey", Some(VersionId::FIRST)).unwrap();

    let mut options = RunOptions::new("survey", controller.config());
    options.unlock = true;
    options.unlock_q = 0.8;
    options.unlock_add_k = 2;
    let plan = controller.plan_run(&options).unwrap();
    controller.execute(&plan, &base, &options).unwrap();

    let after_v1 = controller.repository().load_version("survey", Some(VersionId::FIRST)).unwrap();
    let latest = controller.repository().load_version("survey", None).unwrap();
    assert_eq!(after_v1.centroids, before.centroids);
    for i in 0..before.centroids.len() {
        assert_eq!(latest.centroids.row(i), before.centroids.row(i));
    }
    println!(
        "[VERIFIED] v001 unchanged; latest has {} centroids (was {})",
        latest.centroids.len(),
        before.centroids.len()
    );
}

// =========================================================================
// Versioning
// =========================================================================

#[test]
fn test_versions_are_monotonic_and_history_is_unchanged() {
    let repo = InMemoryBaselineRepository::new();
    let first = repo.create_version("p", &sample_draft("p")).unwrap();
    let checksum = repo.ledger("p").unwrap()[0].sha256.clone();

    for _ in 0..4 {
        repo.create_version("p", &sample_draft("p")).unwrap();
    }
    let versions = repo.list_versions("p").unwrap();
    assert_eq!(versions.len(), 5);
    assert!(versions.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(versions[0], first);

    let reloaded = repo.load_version("p", Some(first)).unwrap();
    assert_eq!(reloaded.centroids.checksum(), checksum);
    println!("[VERIFIED] versions {:?}", versions.iter().map(|v| v.to_string()).collect::<Vec<_>>());
}
