//! First-stage axes: standardize → variance reduction → independent rotation.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ica::{fit_fast_ica, IcaConfig};
use super::retry::FitAttemptPolicy;
use super::variance::{standardize_with, VarianceModel};
use crate::error::{AxisError, AxisResult};
use crate::linalg::{matrix_from_rows, matrix_to_rows};

/// Frozen first-stage transform.
///
/// Field names are the persisted document keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage1Transform {
    pub scaler_mean: Vec<f64>,
    pub scaler_scale: Vec<f64>,
    /// `pca_n_components × embed_dim`
    pub pca_components: Vec<Vec<f64>>,
    pub pca_mean: Vec<f64>,
    pub pca_n_components: usize,
    /// `ica1_n_components × pca_n_components`
    pub ica1_components: Vec<Vec<f64>>,
    pub ica1_n_components: usize,
    pub embed_dim: usize,
}

impl Stage1Transform {
    /// Fit on `x` and return the transform with the training coordinates (`n × d1`).
    pub fn fit(
        x: &DMatrix<f64>,
        pca_var: f64,
        d1_requested: usize,
        seed: u64,
        ica: &IcaConfig,
    ) -> AxisResult<(Self, DMatrix<f64>)> {
        let model = VarianceModel::fit(x)?;
        Self::fit_with_model(&model, x, pca_var, d1_requested, seed, ica)
    }

    /// Fit reusing an already fitted [`VarianceModel`] of the same `x`.
    pub fn fit_with_model(
        model: &VarianceModel,
        x: &DMatrix<f64>,
        pca_var: f64,
        d1_requested: usize,
        seed: u64,
        ica: &IcaConfig,
    ) -> AxisResult<(Self, DMatrix<f64>)> {
        let n_pcs = model.components_for_variance(pca_var);
        let d1 = d1_requested.clamp(2, n_pcs);
        let projected = model.project(x, n_pcs);

        let (ica_model, attempt) = FitAttemptPolicy::STAGE1.run("stage1", d1, seed, |a| {
            fit_fast_ica(&projected, a.components, a.seed, ica)
        })?;

        let basis = model.components.rows(0, n_pcs).into_owned();
        let transform = Self {
            scaler_mean: model.standardizer.mean.clone(),
            scaler_scale: model.standardizer.scale.clone(),
            pca_components: matrix_to_rows(&basis),
            pca_mean: model.mean.clone(),
            pca_n_components: n_pcs,
            ica1_components: matrix_to_rows(&ica_model.components),
            ica1_n_components: attempt.components,
            embed_dim: x.ncols(),
        };

        info!(
            target: "semaxis::axes",
            n_pcs = n_pcs,
            d1_requested = d1_requested,
            d1 = attempt.components,
            iterations = ica_model.iterations,
            "Fitted stage-1 axes"
        );

        // Training coordinates come from the same forward path used on later runs.
        let coords = transform.apply(x)?;
        Ok((transform, coords))
    }

    /// Map embeddings to first-stage coordinates (`n × d1`).
    ///
    /// # Errors
    ///
    /// `AxisError::DimensionMismatch` when `x` has a different embedding width
    /// than the transform was fitted on.
    pub fn apply(&self, x: &DMatrix<f64>) -> AxisResult<DMatrix<f64>> {
        if x.ncols() != self.embed_dim {
            return Err(AxisError::DimensionMismatch {
                expected: self.embed_dim,
                actual: x.ncols(),
            });
        }
        self.validate()?;

        let xs = standardize_with(x, &self.scaler_mean, &self.scaler_scale);
        let centered = DMatrix::from_fn(xs.nrows(), xs.ncols(), |i, j| xs[(i, j)] - self.pca_mean[j]);
        let basis = matrix_from_rows(&self.pca_components[..self.pca_n_components])?;
        let projected = centered * basis.transpose();
        let rotation = matrix_from_rows(&self.ica1_components)?;
        Ok(projected * rotation.transpose())
    }

    /// Declared first-stage axis count.
    #[inline]
    pub fn axis_count(&self) -> usize {
        self.ica1_n_components
    }

    /// Check internal shape consistency (used after loading from storage).
    pub fn validate(&self) -> AxisResult<()> {
        let d = self.embed_dim;
        let shape_err = |what: &str| AxisError::serialization("stage-1 transform", what);
        if self.scaler_mean.len() != d || self.scaler_scale.len() != d || self.pca_mean.len() != d {
            return Err(shape_err("scaler/mean length differs from embed_dim"));
        }
        if self.pca_n_components == 0 || self.pca_components.len() < self.pca_n_components {
            return Err(shape_err("fewer stored components than pca_n_components"));
        }
        if self.pca_components.iter().any(|r| r.len() != d) {
            return Err(shape_err("component row length differs from embed_dim"));
        }
        if self.ica1_n_components == 0
            || self.ica1_components.len() != self.ica1_n_components
            || self
                .ica1_components
                .iter()
                .any(|r| r.len() != self.pca_n_components)
        {
            return Err(shape_err("rotation shape is not ica1_n_components × pca_n_components"));
        }
        Ok(())
    }
}
