//! Clustering on unit-normalized vectors.
//!
//! Fitting uses Euclidean k-means; because inputs are L2-normalized, this
//! approximates spherical clustering. Centroids are re-normalized after fitting
//! and rows are assigned by cosine distance.

mod assign;
mod kmeans;

pub use assign::{assign_nearest, cosine_distance, cosine_distance_matrix, min_distances, Assignment};
pub use kmeans::{kmeans, KMeansConfig, KMeansResult};

use crate::error::AxisResult;
use crate::linalg::l2_normalize;

/// Labels plus unit centroids from a spherical fit.
#[derive(Debug, Clone)]
pub struct SphericalFit {
    /// Labels as produced by k-means.
    pub labels: Vec<usize>,
    /// Unit-normalized centroids.
    pub centroids: Vec<Vec<f64>>,
}

/// Run k-means on unit vectors and normalize the resulting centroids.
pub fn fit_spherical(points_unit: &[Vec<f64>], config: &KMeansConfig) -> AxisResult<SphericalFit> {
    let result = kmeans(points_unit, config)?;
    Ok(SphericalFit {
        labels: result.labels,
        centroids: result.centroids.iter().map(|c| l2_normalize(c)).collect(),
    })
}
