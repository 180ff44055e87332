//! Second-stage axes: a rotation of stage-1 coordinates re-targeted to the chosen cluster count.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ica::{fit_fast_ica, IcaConfig};
use super::retry::FitAttemptPolicy;
use crate::error::{AxisError, AxisResult};
use crate::linalg::{matrix_from_rows, matrix_to_rows};

/// Frozen second-stage rotation (`ica2_n_components × d1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage2Transform {
    pub ica2_components: Vec<Vec<f64>>,
    pub ica2_n_components: usize,
}

/// `max(1, min(k − 1, d1))`.
#[inline]
pub fn stage2_axis_count(k: usize, d1: usize) -> usize {
    k.saturating_sub(1).min(d1).max(1)
}

impl Stage2Transform {
    /// Fit on stage-1 coordinates for cluster count `k`; returns the transform and `n × d2` coordinates.
    pub fn fit(
        stage1_coords: &DMatrix<f64>,
        k: usize,
        seed: u64,
        ica: &IcaConfig,
    ) -> AxisResult<(Self, DMatrix<f64>)> {
        let d1 = stage1_coords.ncols();
        let d2 = stage2_axis_count(k, d1);

        let (model, attempt) = FitAttemptPolicy::STAGE2.run("stage2", d2, seed, |a| {
            fit_fast_ica(stage1_coords, a.components, a.seed, ica)
        })?;

        let transform = Self {
            ica2_components: matrix_to_rows(&model.components),
            ica2_n_components: attempt.components,
        };
        info!(
            target: "semaxis::axes",
            k = k,
            d1 = d1,
            d2 = attempt.components,
            iterations = model.iterations,
            "Fitted stage-2 axes"
        );

        let coords = transform.apply(stage1_coords)?;
        Ok((transform, coords))
    }

    /// Rotate stage-1 coordinates into stage-2 coordinates.
    pub fn apply(&self, stage1_coords: &DMatrix<f64>) -> AxisResult<DMatrix<f64>> {
        let rotation = matrix_from_rows(&self.ica2_components)?;
        if rotation.ncols() != stage1_coords.ncols() || rotation.nrows() != self.ica2_n_components {
            return Err(AxisError::invalid_input(format!(
                "stage-2 rotation is {}x{} but stage-1 coordinates have {} columns (declared d2={})",
                rotation.nrows(),
                rotation.ncols(),
                stage1_coords.ncols(),
                self.ica2_n_components
            )));
        }
        Ok(stage1_coords * rotation.transpose())
    }

    #[inline]
    pub fn axis_count(&self) -> usize {
        self.ica2_n_components
    }
}
