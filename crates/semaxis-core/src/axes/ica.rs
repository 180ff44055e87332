//! Symmetric FastICA with the log-cosh contrast.
//!
//! # Algorithm
//!
//! 1. Center the input and whiten it with the top `m` eigenvectors of `XᵀX`
//! 2. Draw a Gaussian `m × m` initial unmixing matrix from the seed
//! 3. Fixed-point update `W ← E[g(WX)Xᵀ] − diag(E[g'(WX)])W`, `g = tanh`
//! 4. Symmetric decorrelation `W ← (WWᵀ)^{-1/2} W` after every update
//! 5. Stop when `max |abs(diag(W₁Wᵀ)) − 1| < tol`
//!
//! The returned unmixing matrix maps centered input straight to sources and is
//! rescaled so every source has unit variance on the training data.
//!
//! Failures are reported as [`FitFailure`]; callers decide whether to retry.

use std::fmt;

use nalgebra::{DMatrix, SymmetricEigen};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::config::AnalysisConfig;
use crate::linalg::column_means;

/// Relative eigenvalue floor below which whitening is considered degenerate.
const EIGEN_FLOOR: f64 = 1e-10;

/// Solver settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcaConfig {
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for IcaConfig {
    fn default() -> Self {
        Self {
            max_iter: 5000,
            tol: 1e-4,
        }
    }
}

impl From<&AnalysisConfig> for IcaConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            max_iter: config.ica_max_iter,
            tol: config.ica_tol,
        }
    }
}

/// Why a single FastICA attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub enum FitFailure {
    /// The fixed-point iteration hit `max_iter` without reaching `tol`.
    NotConverged { iterations: usize, lim: f64 },
    /// The data cannot support the requested component count.
    Degenerate(String),
}

impl fmt::Display for FitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConverged { iterations, lim } => write!(
                f,
                "did not converge after {} iterations (lim={:.3e})",
                iterations, lim
            ),
            Self::Degenerate(reason) => write!(f, "degenerate input: {}", reason),
        }
    }
}

/// A fitted unmixing matrix.
#[derive(Debug, Clone)]
pub struct IcaModel {
    /// `m × p` unmixing matrix (sources = centered input · componentsᵀ).
    pub components: DMatrix<f64>,
    pub iterations: usize,
}

/// Fit `n_components` independent components on `x` (`n × p`, one sample per row).
pub fn fit_fast_ica(
    x: &DMatrix<f64>,
    n_components: usize,
    seed: u64,
    config: &IcaConfig,
) -> Result<IcaModel, FitFailure> {
    let n = x.nrows();
    let p = x.ncols();
    let m = n_components;
    if m == 0 || m > p {
        return Err(FitFailure::Degenerate(format!(
            "cannot extract {} components from {} features",
            m, p
        )));
    }
    if n < 2 {
        return Err(FitFailure::Degenerate(format!("only {} samples", n)));
    }

    let means = column_means(x);
    let xc = DMatrix::from_fn(n, p, |i, j| x[(i, j)] - means[j]);

    // Whitening
    let eig = SymmetricEigen::new(xc.transpose() * &xc);
    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));
    let top = eig.eigenvalues[order[0]];
    if !(top > 0.0 && top.is_finite()) {
        return Err(FitFailure::Degenerate("input has no variance".to_string()));
    }
    let mut whitening = DMatrix::zeros(m, p);
    for (r, &idx) in order.iter().take(m).enumerate() {
        let lambda = eig.eigenvalues[idx];
        if !(lambda > top * EIGEN_FLOOR) {
            return Err(FitFailure::Degenerate(format!(
                "whitening eigenvalue {:.3e} for component {} is too small",
                lambda,
                r + 1
            )));
        }
        let inv = 1.0 / lambda.sqrt();
        for c in 0..p {
            whitening[(r, c)] = eig.eigenvectors[(c, idx)] * inv;
        }
    }
    let nf = n as f64;
    let x1 = (&whitening * xc.transpose()) * nf.sqrt();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let w_init = DMatrix::from_fn(m, m, |_, _| rng.sample::<f64, _>(StandardNormal));
    let mut w = symmetric_decorrelation(&w_init)?;

    let mut converged = false;
    let mut iterations = 0;
    let mut lim = f64::INFINITY;
    for it in 1..=config.max_iter {
        iterations = it;
        let gwx = (&w * &x1).map(|v| v.tanh());
        let mut w1 = (&gwx * x1.transpose()) / nf;
        for i in 0..m {
            let g_prime = gwx.row(i).iter().map(|g| 1.0 - g * g).sum::<f64>() / nf;
            for j in 0..m {
                w1[(i, j)] -= g_prime * w[(i, j)];
            }
        }
        let w1 = symmetric_decorrelation(&w1)?;
        let prod = &w1 * w.transpose();
        lim = (0..m)
            .map(|i| (prod[(i, i)].abs() - 1.0).abs())
            .fold(0.0, f64::max);
        w = w1;
        if lim < config.tol {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(FitFailure::NotConverged { iterations, lim });
    }

    // Unit-variance sources on the training data
    let mut components = &w * &whitening;
    let sources = &xc * components.transpose();
    for r in 0..m {
        let col = sources.column(r);
        let mean = col.sum() / nf;
        let std = (col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / nf).sqrt();
        if !(std > 0.0 && std.is_finite()) {
            return Err(FitFailure::Degenerate(format!(
                "source {} has zero variance",
                r + 1
            )));
        }
        for c in 0..p {
            components[(r, c)] /= std;
        }
    }

    Ok(IcaModel {
        components,
        iterations,
    })
}

/// `W ← (WWᵀ)^{-1/2} W`.
fn symmetric_decorrelation(w: &DMatrix<f64>) -> Result<DMatrix<f64>, FitFailure> {
    let eig = SymmetricEigen::new(w * w.transpose());
    let m = w.nrows();
    let mut scaled = eig.eigenvectors.clone();
    for (j, lambda) in eig.eigenvalues.iter().enumerate() {
        if !(*lambda > 0.0 && lambda.is_finite()) {
            return Err(FitFailure::Degenerate(
                "unmixing matrix became singular".to_string(),
            ));
        }
        let inv = 1.0 / lambda.sqrt();
        for i in 0..m {
            scaled[(i, j)] *= inv;
        }
    }
    Ok(scaled * eig.eigenvectors.transpose() * w)
}
