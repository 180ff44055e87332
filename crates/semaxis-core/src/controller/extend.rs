//! Unlock-mode extension: append centroids for rows far from every existing centroid.

use tracing::info;

use crate::baseline::ExtensionInfo;
use crate::clustering::{fit_spherical, min_distances, KMeansConfig};
use crate::config::{validate_unlock_quantile, AnalysisConfig};
use crate::error::{AxisError, AxisResult};
use crate::linalg::quantile_linear;

/// Centroids after extension plus what happened.
#[derive(Debug, Clone)]
pub struct Extension {
    /// Existing centroids in their original order, then any new ones.
    pub centroids: Vec<Vec<f64>>,
    pub info: ExtensionInfo,
    /// Per row: distance to the existing centroids was at or above the threshold.
    pub novel: Vec<bool>,
}

/// Extend `base` with up to `add_k` centroids fitted on the novel rows.
///
/// Rows whose nearest-centroid cosine distance is at or above the `q`-quantile
/// of all such distances are novel. With no novel rows or `add_k == 0` the
/// centroid set is returned unchanged.
pub fn extend_centroids(
    points_unit: &[Vec<f64>],
    base: &[Vec<f64>],
    q: f64,
    add_k: usize,
    analysis: &AnalysisConfig,
) -> AxisResult<Extension> {
    validate_unlock_quantile(q)?;
    let nearest = min_distances(points_unit, base)?;
    let threshold = quantile_linear(&nearest, q)
        .ok_or_else(|| AxisError::invalid_input("cannot extend centroids without rows"))?;
    let novel: Vec<bool> = nearest.iter().map(|d| *d >= threshold).collect();
    let outlier_count = novel.iter().filter(|n| **n).count();

    let mut info = ExtensionInfo {
        q,
        add_k,
        threshold,
        outlier_count,
        added_clusters: 0,
    };
    let mut centroids = base.to_vec();

    if outlier_count > 0 && add_k > 0 {
        let subset: Vec<Vec<f64>> = points_unit
            .iter()
            .zip(novel.iter())
            .filter(|(_, n)| **n)
            .map(|(p, _)| p.clone())
            .collect();
        let k = add_k.min(subset.len().max(1));
        let config = KMeansConfig::new(k, analysis.kmeans_max_iter, analysis.kmeans_tol)?
            .with_restarts(analysis.explore_restarts)
            .with_seed(analysis.seed);
        let fit = fit_spherical(&subset, &config)?;
        centroids.extend(fit.centroids);
        info.added_clusters = k;
    }

    info!(
        target: "semaxis::controller",
        q = q,
        threshold = threshold,
        outliers = outlier_count,
        added = info.added_clusters,
        total = centroids.len(),
        "Unlock extension"
    );
    Ok(Extension {
        centroids,
        info,
        novel,
    })
}
