//! Cluster quality metrics: cohesion, separation and inverse spread.
//!
//! | Score          | Measure                                | Better | On failure |
//! |----------------|----------------------------------------|--------|------------|
//! | cohesion       | mean silhouette, cosine distance       | higher | −1.0       |
//! | separation     | Calinski–Harabasz variance ratio       | higher | 0.0        |
//! | inverse_spread | 1 / (1 + Davies–Bouldin)               | higher | 0.0        |
//!
//! Every metric needs `2 <= distinct labels <= n − 1`. A metric that cannot be
//! computed yields its conservative default so the candidate stays rankable.

use std::collections::BTreeMap;
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clustering::cosine_distance;
use crate::linalg::{euclidean, squared_euclidean};

/// Davies–Bouldin value recorded when the metric cannot be computed.
pub const DEFAULT_SPREAD: f64 = 10.0;

/// Quality scores for one labelling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterScores {
    pub cohesion: f64,
    pub separation: f64,
    pub inverse_spread: f64,
    /// Raw Davies–Bouldin index (lower is better).
    pub spread: f64,
}

impl ClusterScores {
    /// Scores used when nothing could be computed.
    pub const FALLBACK: Self = Self {
        cohesion: -1.0,
        separation: 0.0,
        inverse_spread: 0.0,
        spread: DEFAULT_SPREAD,
    };
}

/// Why a metric could not be computed.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricError {
    /// Label count outside `2..=n−1`.
    LabelCount { labels: usize, samples: usize },
    /// Points and labels differ in length.
    LengthMismatch { points: usize, labels: usize },
    /// Result was NaN or infinite.
    NonFinite(&'static str),
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LabelCount { labels, samples } => write!(
                f,
                "number of labels is {}; valid values are 2 to n_samples - 1 (n={})",
                labels, samples
            ),
            Self::LengthMismatch { points, labels } => {
                write!(f, "{} points but {} labels", points, labels)
            }
            Self::NonFinite(metric) => write!(f, "{} is not finite", metric),
        }
    }
}

/// Score a labelling of unit-normalized points.
pub fn evaluate_clustering(points_unit: &[Vec<f64>], labels: &[usize]) -> ClusterScores {
    let cohesion = silhouette_cosine(points_unit, labels).unwrap_or_else(|e| {
        debug!(target: "semaxis::metrics", reason = %e, "cohesion unavailable, using -1");
        ClusterScores::FALLBACK.cohesion
    });
    let separation = calinski_harabasz(points_unit, labels).unwrap_or_else(|e| {
        debug!(target: "semaxis::metrics", reason = %e, "separation unavailable, using 0");
        ClusterScores::FALLBACK.separation
    });
    let (spread, inverse_spread) = match davies_bouldin(points_unit, labels) {
        Ok(db) => (db, 1.0 / (1.0 + db)),
        Err(e) => {
            debug!(target: "semaxis::metrics", reason = %e, "inverse spread unavailable, using 0");
            (DEFAULT_SPREAD, ClusterScores::FALLBACK.inverse_spread)
        }
    };

    ClusterScores {
        cohesion,
        separation,
        inverse_spread,
        spread,
    }
}

/// Group row indices by label, in label order.
fn groups(points: &[Vec<f64>], labels: &[usize]) -> Result<Vec<Vec<usize>>, MetricError> {
    if points.len() != labels.len() {
        return Err(MetricError::LengthMismatch {
            points: points.len(),
            labels: labels.len(),
        });
    }
    let mut by_label: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &l) in labels.iter().enumerate() {
        by_label.entry(l).or_default().push(i);
    }
    let n = points.len();
    let k = by_label.len();
    if k < 2 || k + 1 > n {
        return Err(MetricError::LabelCount {
            labels: k,
            samples: n,
        });
    }
    Ok(by_label.into_values().collect())
}

fn centroid(points: &[Vec<f64>], members: &[usize]) -> Vec<f64> {
    let dim = points[members[0]].len();
    let mut c = vec![0.0; dim];
    for &i in members {
        for (acc, v) in c.iter_mut().zip(points[i].iter()) {
            *acc += v;
        }
    }
    let m = members.len() as f64;
    c.iter_mut().for_each(|v| *v /= m);
    c
}

/// Mean silhouette coefficient with cosine distance. Rows in singleton clusters score 0.
pub fn silhouette_cosine(points: &[Vec<f64>], labels: &[usize]) -> Result<f64, MetricError> {
    let clusters = groups(points, labels)?;
    let mut cluster_of = vec![0usize; points.len()];
    for (c, members) in clusters.iter().enumerate() {
        for &i in members {
            cluster_of[i] = c;
        }
    }

    let total: f64 = (0..points.len())
        .into_par_iter()
        .map(|i| {
            let own = cluster_of[i];
            if clusters[own].len() <= 1 {
                return 0.0;
            }
            let mut mean_dist = vec![0.0; clusters.len()];
            for (c, members) in clusters.iter().enumerate() {
                let sum: f64 = members
                    .iter()
                    .filter(|&&j| j != i)
                    .map(|&j| cosine_distance(&points[i], &points[j]))
                    .sum();
                let count = if c == own { members.len() - 1 } else { members.len() };
                mean_dist[c] = sum / count as f64;
            }
            let a = mean_dist[own];
            let b = mean_dist
                .iter()
                .enumerate()
                .filter(|(c, _)| *c != own)
                .map(|(_, d)| *d)
                .fold(f64::INFINITY, f64::min);
            let denom = a.max(b);
            if denom > 0.0 {
                (b - a) / denom
            } else {
                0.0
            }
        })
        .sum();

    let score = total / points.len() as f64;
    if score.is_finite() {
        Ok(score)
    } else {
        Err(MetricError::NonFinite("silhouette"))
    }
}

/// Calinski–Harabasz index (Euclidean). Returns 1.0 when every cluster has zero dispersion.
pub fn calinski_harabasz(points: &[Vec<f64>], labels: &[usize]) -> Result<f64, MetricError> {
    let clusters = groups(points, labels)?;
    let n = points.len();
    let k = clusters.len();
    let all: Vec<usize> = (0..n).collect();
    let overall = centroid(points, &all);

    let mut between = 0.0;
    let mut within = 0.0;
    for members in &clusters {
        let c = centroid(points, members);
        between += members.len() as f64 * squared_euclidean(&c, &overall);
        within += members
            .iter()
            .map(|&i| squared_euclidean(&points[i], &c))
            .sum::<f64>();
    }

    if within == 0.0 {
        return Ok(1.0);
    }
    let score = between * (n - k) as f64 / (within * (k - 1) as f64);
    if score.is_finite() {
        Ok(score)
    } else {
        Err(MetricError::NonFinite("calinski_harabasz"))
    }
}

/// Davies–Bouldin index (Euclidean). Returns 0.0 for zero intra- or inter-cluster dispersion.
pub fn davies_bouldin(points: &[Vec<f64>], labels: &[usize]) -> Result<f64, MetricError> {
    let clusters = groups(points, labels)?;
    let centroids: Vec<Vec<f64>> = clusters.iter().map(|m| centroid(points, m)).collect();
    let intra: Vec<f64> = clusters
        .iter()
        .zip(centroids.iter())
        .map(|(members, c)| {
            members.iter().map(|&i| euclidean(&points[i], c)).sum::<f64>() / members.len() as f64
        })
        .collect();

    let k = clusters.len();
    let all_intra_zero = intra.iter().all(|s| s.abs() < 1e-12);
    let mut all_centers_zero = true;
    let mut worst = vec![0.0f64; k];
    for i in 0..k {
        for j in 0..k {
            if i == j {
                continue;
            }
            let m = euclidean(&centroids[i], &centroids[j]);
            if m > 1e-12 {
                all_centers_zero = false;
                worst[i] = worst[i].max((intra[i] + intra[j]) / m);
            }
        }
    }
    if all_intra_zero || all_centers_zero {
        return Ok(0.0);
    }

    let score = worst.iter().sum::<f64>() / k as f64;
    if score.is_finite() {
        Ok(score)
    } else {
        Err(MetricError::NonFinite("davies_bouldin"))
    }
}
