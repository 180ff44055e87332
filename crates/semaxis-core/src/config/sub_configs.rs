//! Sub-configuration structures for semaxis components.
//!
//! Each struct is one section of the main `Config`.

use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            include_target: true,
        }
    }
}

/// Axis fitting, exploration and clustering parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Explained-variance target for the linear reduction, in (0, 1).
    pub pca_var: f64,

    /// Smallest cluster count explored.
    pub k_min: usize,

    /// Largest cluster count explored (reduced automatically for small inputs).
    pub k_max: usize,

    /// Seed for every randomized step (rotation init, k-means++ seeding).
    pub seed: u64,

    /// Iteration cap for the independent-axis solver.
    pub ica_max_iter: usize,

    /// Convergence tolerance for the independent-axis solver.
    pub ica_tol: f64,

    /// k-means restarts during candidate exploration and unlock extension.
    pub explore_restarts: usize,

    /// k-means restarts for the final stage-2 clustering.
    pub final_restarts: usize,

    /// Lloyd iteration cap per k-means restart.
    pub kmeans_max_iter: usize,

    /// Relative k-means tolerance (scaled by the mean feature variance).
    pub kmeans_tol: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pca_var: 0.90,
            k_min: 3,
            k_max: 12,
            seed: 42,
            ica_max_iter: 5000,
            ica_tol: 1e-4,
            explore_restarts: 10,
            final_restarts: 20,
            kmeans_max_iter: 300,
            kmeans_tol: 1e-4,
        }
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model identifier recorded in baseline provenance.
    pub model: String,
    pub batch_size: usize,
    /// Maximum token length before the provider truncates.
    pub max_len: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "cl-nagoya/ruri-v3-310m".to_string(),
            batch_size: 16,
            max_len: 384,
        }
    }
}

/// Baseline and run output location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `baseline_<project>` and `run_<project>_<NN>` folders.
    pub result_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            result_root: "semaxis-results".to_string(),
        }
    }
}

/// Unlock-mode extension parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UnlockConfig {
    /// Distance quantile above which rows count as novel, in (0, 1).
    pub q: f64,
    /// Maximum number of clusters appended per unlock run.
    pub add_k: usize,
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self { q: 0.90, add_k: 2 }
    }
}
