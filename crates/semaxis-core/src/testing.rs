//! Small fixtures shared by tests across the workspace crates.
//!
//! Compiled for this crate's unit tests and, through the `test-utils`
//! feature, for the dev-dependencies of other crates.

use chrono::Utc;

use crate::axes::{Stage1Transform, Stage2Transform};
use crate::baseline::{
    BaselineMode, CentroidSet, EnvironmentInfo, VersionDraft, VersionManifest, ALGORITHM_VERSION,
    METRIC_FAMILY,
};
use crate::explorer::RANK_METHOD;

/// A valid manifest for `project`.
pub fn sample_manifest(project: &str) -> VersionManifest {
    VersionManifest {
        project: project.to_string(),
        mode: BaselineMode::First,
        created_at: Utc::now(),
        algorithm_version: ALGORITHM_VERSION.to_string(),
        embedding_model: "test-model".to_string(),
        pca_var: 0.9,
        seed: 42,
        rank_method: RANK_METHOD.to_string(),
        metric_family: METRIC_FAMILY.to_string(),
        centroids_are_normalized: true,
        plan: None,
        unlock: None,
        extended_from: None,
        environment: EnvironmentInfo::current("cpu"),
    }
}

/// A tiny, internally consistent draft: 4-d embeddings, d1 = 2, d2 = 1, two centroids.
pub fn sample_draft(project: &str) -> VersionDraft {
    let stage1 = Stage1Transform {
        scaler_mean: vec![0.0; 4],
        scaler_scale: vec![1.0; 4],
        pca_components: vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]],
        pca_mean: vec![0.0; 4],
        pca_n_components: 2,
        ica1_components: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        ica1_n_components: 2,
        embed_dim: 4,
    };
    let stage2 = Stage2Transform {
        ica2_components: vec![vec![1.0, 0.0]],
        ica2_n_components: 1,
    };
    // Rows are valid and finite, so construction cannot fail.
    let centroids = CentroidSet::from_rows(&[vec![1.0], vec![-1.0]])
        .unwrap_or_else(|e| panic!("fixture centroids: {e}"));
    VersionDraft {
        stage1,
        stage2,
        centroids,
        manifest: sample_manifest(project),
    }
}
