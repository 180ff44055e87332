//! Standardization and linear variance decomposition.
//!
//! Both depend only on the embedding matrix, so the explorer fits a
//! [`VarianceModel`] once and reuses it for every stage-1 fit in the grid.

use nalgebra::{DMatrix, SVD};
use tracing::debug;

use crate::error::{AxisError, AxisResult};
use crate::linalg::{column_means, column_stds};

/// Per-dimension zero-mean, unit-variance scaling.
///
/// Dimensions with zero variance keep scale 1.0 so they map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Standardizer {
    pub fn fit(x: &DMatrix<f64>) -> Self {
        let mean = column_means(x);
        let scale = column_stds(x, &mean)
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();
        Self { mean, scale }
    }

    pub fn transform(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        standardize_with(x, &self.mean, &self.scale)
    }
}

/// Standardize with stored statistics. A stored scale of exactly 0.0 is treated as 1.0.
pub(crate) fn standardize_with(x: &DMatrix<f64>, mean: &[f64], scale: &[f64]) -> DMatrix<f64> {
    DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| {
        let s = if scale[j] == 0.0 { 1.0 } else { scale[j] };
        (x[(i, j)] - mean[j]) / s
    })
}

/// Standardizer plus principal-component basis of the standardized data.
#[derive(Debug, Clone)]
pub struct VarianceModel {
    pub standardizer: Standardizer,
    /// Component basis, one component per row (`max_components × d_embed`), by decreasing variance.
    pub components: DMatrix<f64>,
    /// Mean of the standardized data (numerically ~0, kept for exact re-application).
    pub mean: Vec<f64>,
    /// Explained-variance ratio per retained component.
    pub explained_variance_ratio: Vec<f64>,
}

impl VarianceModel {
    /// Fit standardization and the variance decomposition, capped at `min(n - 1, d)` components.
    ///
    /// # Errors
    ///
    /// `AxisError::Analysis` when fewer than two components are available
    /// (n < 3 or d < 2) or the decomposition fails.
    pub fn fit(x: &DMatrix<f64>) -> AxisResult<Self> {
        let n = x.nrows();
        let d = x.ncols();
        let max_components = n.saturating_sub(1).min(d);
        if max_components < 2 {
            return Err(AxisError::analysis(format!(
                "variance decomposition needs at least 2 components, have {} (n={}, d={})",
                max_components, n, d
            )));
        }

        let standardizer = Standardizer::fit(x);
        let xs = standardizer.transform(x);
        let mean = column_means(&xs);
        let xc = DMatrix::from_fn(n, d, |i, j| xs[(i, j)] - mean[j]);

        let svd = SVD::new(xc, false, true);
        let v_t = svd
            .v_t
            .ok_or_else(|| AxisError::analysis("variance decomposition produced no basis"))?;
        let singular = svd.singular_values;

        let mut order: Vec<usize> = (0..singular.len()).collect();
        order.sort_by(|&a, &b| singular[b].total_cmp(&singular[a]));

        let total: f64 = singular.iter().map(|s| s * s).sum();
        if !(total > 0.0) {
            return Err(AxisError::analysis(
                "standardized embeddings have zero total variance",
            ));
        }

        let mut components = DMatrix::zeros(max_components, d);
        let mut explained_variance_ratio = Vec::with_capacity(max_components);
        for (r, &idx) in order.iter().take(max_components).enumerate() {
            // Sign convention: largest-magnitude loading is positive.
            let row = v_t.row(idx);
            let pivot = row
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(1.0);
            let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
            for c in 0..d {
                components[(r, c)] = row[c] * sign;
            }
            explained_variance_ratio.push(singular[idx] * singular[idx] / total);
        }

        debug!(
            target: "semaxis::axes",
            n = n,
            d = d,
            max_components = max_components,
            "Fitted variance model"
        );

        Ok(Self {
            standardizer,
            components,
            mean,
            explained_variance_ratio,
        })
    }

    /// Number of components available for selection.
    #[inline]
    pub fn max_components(&self) -> usize {
        self.components.nrows()
    }

    /// Smallest component count whose cumulative ratio reaches `target`, floored at 2.
    pub fn components_for_variance(&self, target: f64) -> usize {
        let raw = self.raw_components_for_variance(target);
        raw.min(self.max_components()).max(2)
    }

    /// Unclamped `searchsorted(cumsum, target) + 1`; may exceed the available count.
    pub(crate) fn raw_components_for_variance(&self, target: f64) -> usize {
        let mut cumulative = 0.0;
        for (i, ratio) in self.explained_variance_ratio.iter().enumerate() {
            cumulative += ratio;
            if cumulative >= target {
                return i + 1;
            }
        }
        self.explained_variance_ratio.len() + 1
    }

    /// Project embeddings onto the first `n_components` components.
    pub fn project(&self, x: &DMatrix<f64>, n_components: usize) -> DMatrix<f64> {
        let xs = self.standardizer.transform(x);
        let basis = self.components.rows(0, n_components.min(self.max_components()));
        let centered = DMatrix::from_fn(xs.nrows(), xs.ncols(), |i, j| xs[(i, j)] - self.mean[j]);
        centered * basis.transpose()
    }
}
