//! Candidate Explorer & Ranker.
//!
//! # Flow
//!
//! 1. Fit the [`VarianceModel`] once and propose up to five stage-1 axis counts
//! 2. For each axis count fit stage 1, then cluster its unit-normalized
//!    coordinates for every K in the grid and score the labels
//! 3. Rank all candidates by mean metric rank ([`rank_candidates`])
//! 4. Optionally re-score the shortlist of the best axis count with the final
//!    stage-2 clustering ([`CandidateExplorer::rescore_shortlist`])
//!
//! Stage-1 fits are kept in the [`Exploration`] so a commit reuses exactly the
//! transform its chosen candidate was scored with.

mod proposal;
mod ranking;

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::axes::{IcaConfig, Stage1Transform, Stage2Transform, VarianceModel};
use crate::clustering::{fit_spherical, kmeans, KMeansConfig};
use crate::config::AnalysisConfig;
use crate::error::{AxisError, AxisResult};
use crate::linalg::l2_normalize_rows;
use crate::metrics::{evaluate_clustering, ClusterScores};

pub use proposal::{
    propose_axis_counts, MAX_PROPOSALS, MAX_PROPOSED_AXES, MIN_PROPOSED_AXES, PROBE_AXIS_COUNTS,
    VARIANCE_THRESHOLDS,
};
pub use ranking::{
    choose_best_axis_count, rank_candidates, shortlist_for_axis_count, Candidate, RankSummary,
    Rankable, RANK_METHOD, SHORTLIST_SIZE,
};

/// Fewest rows any analysis accepts.
pub const MIN_ROWS: usize = 3;

/// `max(2, min(k_max, n − 1))`.
#[inline]
pub fn effective_k_max(k_max: usize, n: usize) -> usize {
    k_max.min(n.saturating_sub(1)).max(2)
}

/// A fitted stage-1 transform with its training coordinates.
#[derive(Debug, Clone)]
pub struct Stage1Fit {
    pub transform: Stage1Transform,
    pub coords: DMatrix<f64>,
}

/// Stage-2 transform plus the final spherical clustering for one K.
#[derive(Debug, Clone)]
pub struct FinalFit {
    pub stage2: Stage2Transform,
    pub coords: DMatrix<f64>,
    /// Unit-normalized rows of `coords`.
    pub unit: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    /// Unit-normalized centroids.
    pub centroids: Vec<Vec<f64>>,
}

/// Result of the grid search.
#[derive(Debug, Clone)]
pub struct Exploration {
    /// Ranked candidates; index `i` is plan number `i + 1`.
    pub candidates: Vec<Candidate>,
    /// Proposed stage-1 axis counts.
    pub axis_counts: Vec<usize>,
    /// Inclusive K range of the grid (before skipping K >= n).
    pub k_range: (usize, usize),
    stage1: BTreeMap<usize, Stage1Fit>,
}

impl Exploration {
    /// Global rank-1 candidate.
    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// Candidate for a plan number, clamped to `1..=len`. Returns the resolved plan number.
    pub fn plan(&self, plan: usize) -> Option<(usize, &Candidate)> {
        if self.candidates.is_empty() {
            return None;
        }
        let resolved = plan.clamp(1, self.candidates.len());
        Some((resolved, &self.candidates[resolved - 1]))
    }

    /// Stage-1 fit for an actual axis count.
    pub fn stage1_for(&self, d1: usize) -> Option<&Stage1Fit> {
        self.stage1.get(&d1)
    }

    pub fn best_axis_count(&self) -> Option<usize> {
        choose_best_axis_count(&self.candidates)
    }

    /// Top candidates of the best axis count.
    pub fn shortlist(&self) -> Vec<Candidate> {
        self.best_axis_count()
            .map(|d| shortlist_for_axis_count(&self.candidates, d))
            .unwrap_or_default()
    }
}

/// One re-scored shortlist entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortlistRow {
    /// 1-based position in the shortlist (before re-ranking).
    pub plan: usize,
    pub d1: usize,
    pub d2: usize,
    pub k: usize,
    pub scores: ClusterScores,
    pub ranks: RankSummary,
}

impl Rankable for ShortlistRow {
    fn scores(&self) -> &ClusterScores {
        &self.scores
    }
    fn set_ranks(&mut self, ranks: RankSummary) {
        self.ranks = ranks;
    }
    fn ranks(&self) -> &RankSummary {
        &self.ranks
    }
}

/// Final-stage labels of one shortlist entry for every input row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortlistAssignment {
    pub plan: usize,
    pub k: usize,
    pub cluster_ids: Vec<usize>,
}

impl ShortlistAssignment {
    /// Column header, e.g. `cand2_K5`.
    pub fn column_name(&self) -> String {
        format!("cand{}_K{}", self.plan, self.k)
    }
}

/// Shortlist evaluated under the final stage-2 clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortlistEvaluation {
    pub axis_count: usize,
    /// Rows ranked by the same rule as the grid.
    pub rows: Vec<ShortlistRow>,
    /// Per-row labels, in shortlist order.
    pub assignments: Vec<ShortlistAssignment>,
}

/// Runs the grid search and shortlist re-scoring for one configuration.
#[derive(Debug, Clone)]
pub struct CandidateExplorer {
    config: AnalysisConfig,
    ica: IcaConfig,
}

impl CandidateExplorer {
    pub fn new(config: AnalysisConfig) -> Self {
        let ica = IcaConfig::from(&config);
        Self { config, ica }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Explore every (axis count, K) combination and rank the results.
    ///
    /// # Errors
    ///
    /// - `AxisError::Configuration` when fewer than 3 rows are given
    /// - `AxisError::Analysis` when a stage-1 fit exhausts its retries or no candidate is produced
    pub fn explore(&self, x: &DMatrix<f64>) -> AxisResult<Exploration> {
        let n = x.nrows();
        if n < MIN_ROWS {
            return Err(AxisError::configuration(format!(
                "at least {} input rows are required, got {}",
                MIN_ROWS, n
            )));
        }
        let a = &self.config;
        let k_max_eff = effective_k_max(a.k_max, n);
        if k_max_eff < a.k_max {
            warn!(
                target: "semaxis::explorer",
                k_max = a.k_max,
                k_max_effective = k_max_eff,
                n = n,
                "Reduced k_max to fit the sample count"
            );
        }
        let k_range = (a.k_min.max(2), a.k_min.max(k_max_eff));

        let model = VarianceModel::fit(x)?;
        let axis_counts = propose_axis_counts(&model);
        let n_pcs = model.components_for_variance(a.pca_var);
        info!(
            target: "semaxis::explorer",
            n = n,
            axis_counts = ?axis_counts,
            k_min = k_range.0,
            k_max = k_range.1,
            "Exploring candidates"
        );

        let mut requested = BTreeSet::new();
        let mut stage1 = BTreeMap::new();
        let mut candidates = Vec::new();
        for &d in &axis_counts {
            let effective = d.clamp(2, n_pcs);
            if !requested.insert(effective) {
                debug!(target: "semaxis::explorer", d = d, effective = effective, "Axis count already explored");
                continue;
            }
            let (transform, coords) =
                Stage1Transform::fit_with_model(&model, x, a.pca_var, d, a.seed, &self.ica)?;
            let d1 = transform.axis_count();
            if stage1.contains_key(&d1) {
                debug!(target: "semaxis::explorer", d1 = d1, "Degraded fit collides with an explored axis count");
                continue;
            }

            let unit = l2_normalize_rows(&coords);
            let grid: Vec<Candidate> = (k_range.0..=k_range.1)
                .into_par_iter()
                .filter(|&k| k < n)
                .map(|k| self.score_candidate(&unit, d1, k))
                .collect::<AxisResult<_>>()?;
            candidates.extend(grid);
            stage1.insert(d1, Stage1Fit { transform, coords });
        }

        if candidates.is_empty() {
            return Err(AxisError::analysis(
                "no valid candidates; check the data size and k_min/k_max",
            ));
        }
        rank_candidates(&mut candidates);

        if let Some(best) = candidates.first() {
            info!(
                target: "semaxis::explorer",
                candidates = candidates.len(),
                best_d1 = best.d1,
                best_k = best.k,
                cohesion = best.scores.cohesion,
                "Exploration complete"
            );
        }

        Ok(Exploration {
            candidates,
            axis_counts,
            k_range,
            stage1,
        })
    }

    fn score_candidate(&self, unit: &[Vec<f64>], d1: usize, k: usize) -> AxisResult<Candidate> {
        let a = &self.config;
        let config = KMeansConfig::new(k, a.kmeans_max_iter, a.kmeans_tol)?
            .with_restarts(a.explore_restarts)
            .with_seed(a.seed);
        let labels = kmeans(unit, &config)?.labels;
        let scores = evaluate_clustering(unit, &labels);
        debug!(target: "semaxis::explorer", d1 = d1, k = k, scores = ?scores, "Scored candidate");
        Ok(Candidate {
            d1,
            k,
            scores,
            ranks: RankSummary::default(),
        })
    }

    /// Fit stage 2 for `k` on a stage-1 fit and run the final clustering.
    pub fn fit_final(&self, stage1: &Stage1Fit, k: usize) -> AxisResult<FinalFit> {
        let a = &self.config;
        let (stage2, coords) = Stage2Transform::fit(&stage1.coords, k, a.seed, &self.ica)?;
        let unit = l2_normalize_rows(&coords);
        let config = KMeansConfig::new(k, a.kmeans_max_iter, a.kmeans_tol)?
            .with_restarts(a.final_restarts)
            .with_seed(a.seed);
        let fit = fit_spherical(&unit, &config)?;
        Ok(FinalFit {
            stage2,
            coords,
            unit,
            labels: fit.labels,
            centroids: fit.centroids,
        })
    }

    /// Re-score the shortlist of the best axis count with stage 2 and the final clustering.
    pub fn rescore_shortlist(&self, exploration: &Exploration) -> AxisResult<ShortlistEvaluation> {
        let axis_count = exploration
            .best_axis_count()
            .ok_or_else(|| AxisError::analysis("no candidates to shortlist"))?;
        let stage1 = exploration.stage1_for(axis_count).ok_or_else(|| {
            AxisError::analysis(format!("no stage-1 fit recorded for d1={}", axis_count))
        })?;
        let plans = shortlist_for_axis_count(&exploration.candidates, axis_count);

        let mut rows = Vec::with_capacity(plans.len());
        let mut assignments = Vec::with_capacity(plans.len());
        for (i, candidate) in plans.iter().enumerate() {
            let fit = self.fit_final(stage1, candidate.k)?;
            let scores = evaluate_clustering(&fit.unit, &fit.labels);
            rows.push(ShortlistRow {
                plan: i + 1,
                d1: axis_count,
                d2: fit.stage2.axis_count(),
                k: candidate.k,
                scores,
                ranks: RankSummary::default(),
            });
            assignments.push(ShortlistAssignment {
                plan: i + 1,
                k: candidate.k,
                cluster_ids: fit.labels,
            });
        }
        rank_candidates(&mut rows);

        info!(
            target: "semaxis::explorer",
            axis_count = axis_count,
            shortlisted = rows.len(),
            "Shortlist re-scored with final clustering"
        );
        Ok(ShortlistEvaluation {
            axis_count,
            rows,
            assignments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::matrix_from_rows;
    use crate::synthetic::{generate_topic_embeddings, TopicEmbeddingSpec};

    fn small_config() -> AnalysisConfig {
        AnalysisConfig {
            k_min: 2,
            k_max: 5,
            explore_restarts: 3,
            final_restarts: 3,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn test_effective_k_max() {
        assert_eq!(effective_k_max(12, 3), 2);
        assert_eq!(effective_k_max(12, 100), 12);
        assert_eq!(effective_k_max(4, 2), 2);
    }

    #[test]
    fn test_explore_three_rows_excludes_k_at_or_above_n() {
        let x = matrix_from_rows(&[
            vec![1.0, 0.1, 0.0, 0.3],
            vec![0.0, 1.0, 0.2, 0.1],
            vec![0.4, 0.2, 1.0, 0.0],
        ])
        .unwrap();
        let explorer = CandidateExplorer::new(small_config());
        let exploration = explorer.explore(&x).unwrap();

        assert!(!exploration.candidates.is_empty());
        assert!(exploration.candidates.iter().all(|c| c.k < 3));
        println!(
            "[VERIFIED] n=3 explored {} candidates: {:?}",
            exploration.candidates.len(),
            exploration.candidates.iter().map(|c| (c.d1, c.k)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_explore_rejects_two_rows() {
        let x = matrix_from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let err = CandidateExplorer::new(small_config()).explore(&x).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_plan_numbers_are_clamped() {
        let data = generate_topic_embeddings(&TopicEmbeddingSpec::new(3, 8, 16, 5));
        let x = matrix_from_rows(&data.vectors).unwrap();
        let exploration = CandidateExplorer::new(small_config()).explore(&x).unwrap();
        let len = exploration.candidates.len();

        assert_eq!(exploration.plan(0).map(|(p, _)| p), Some(1));
        assert_eq!(exploration.plan(10_000).map(|(p, _)| p), Some(len));
        assert_eq!(exploration.plan(1).map(|(_, c)| c), exploration.best());
    }

    #[test]
    fn test_rescore_shortlist_produces_matrix() {
        let data = generate_topic_embeddings(&TopicEmbeddingSpec::new(3, 10, 16, 8));
        let x = matrix_from_rows(&data.vectors).unwrap();
        let explorer = CandidateExplorer::new(small_config());
        let exploration = explorer.explore(&x).unwrap();
        let evaluation = explorer.rescore_shortlist(&exploration).unwrap();

        assert!(!evaluation.rows.is_empty() && evaluation.rows.len() <= SHORTLIST_SIZE);
        assert_eq!(evaluation.rows.len(), evaluation.assignments.len());
        for col in &evaluation.assignments {
            assert_eq!(col.cluster_ids.len(), x.nrows());
            assert!(col.cluster_ids.iter().all(|&c| c < col.k));
        }
        for row in &evaluation.rows {
            assert_eq!(row.d1, evaluation.axis_count);
            assert!(row.d2 <= row.k.saturating_sub(1).max(1));
        }
        println!("[VERIFIED] Shortlist columns: {:?}",
            evaluation.assignments.iter().map(|a| a.column_name()).collect::<Vec<_>>());
    }
}
