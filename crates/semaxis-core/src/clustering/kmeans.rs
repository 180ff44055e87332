//! K-means with k-means++ seeding and multiple restarts.
//!
//! # Algorithm
//!
//! 1. Seed k centroids with greedy k-means++ (`2 + ln k` trials per step)
//! 2. Assign each point to its nearest centroid (squared Euclidean)
//! 3. Recompute centroids as member means; an empty cluster takes the point
//!    farthest from its current centroid
//! 4. Stop when labels are stable or total centroid shift falls below the
//!    tolerance (relative to the mean feature variance)
//! 5. Repeat from 1 for every restart; the lowest inertia wins
//!
//! Restarts draw their seeds from one `ChaCha8Rng`, so a fixed seed gives the
//! same labels on every machine. Restarts run in parallel with rayon; the
//! winner is chosen by (inertia, restart index).
//!
//! # Fail-Fast Validation
//!
//! - k must be > 0 and <= number of points
//! - max_iterations and n_init must be > 0
//! - tol must be finite and positive
//! - points must be non-empty and of equal width

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{AxisError, AxisResult};
use crate::linalg::squared_euclidean;

/// Configuration for k-means clustering.
///
/// # Validation
///
/// All parameters are validated at construction time.
#[derive(Clone, Debug, PartialEq)]
pub struct KMeansConfig {
    /// Number of clusters (k).
    pub k: usize,

    /// Lloyd iteration cap per restart.
    pub max_iterations: usize,

    /// Relative convergence tolerance.
    ///
    /// Multiplied by the mean per-feature variance of the data.
    pub tol: f64,

    /// Number of independently seeded restarts.
    pub n_init: usize,

    /// Seed for every restart.
    pub seed: u64,
}

impl KMeansConfig {
    /// Create a new configuration with validation.
    ///
    /// Uses `n_init = 10` and seed 0 until overridden.
    ///
    /// # Errors
    ///
    /// Returns `AxisError::Configuration` if any parameter is invalid.
    pub fn new(k: usize, max_iterations: usize, tol: f64) -> AxisResult<Self> {
        if k == 0 {
            return Err(AxisError::configuration("k must be > 0"));
        }
        if max_iterations == 0 {
            return Err(AxisError::configuration("max_iterations must be > 0"));
        }
        if !(tol > 0.0) || !tol.is_finite() {
            return Err(AxisError::configuration(
                "tol must be a finite positive number",
            ));
        }
        Ok(Self {
            k,
            max_iterations,
            tol,
            n_init: 10,
            seed: 0,
        })
    }

    /// Set the number of restarts (at least 1).
    pub fn with_restarts(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Result of a k-means fit.
#[derive(Clone, Debug)]
pub struct KMeansResult {
    /// Cluster index per point, in `0..k`.
    pub labels: Vec<usize>,
    /// `k` centroids (not normalized).
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances from each point to its centroid.
    pub inertia: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Cluster `points` (one row per point).
pub fn kmeans(points: &[Vec<f64>], config: &KMeansConfig) -> AxisResult<KMeansResult> {
    if points.is_empty() {
        return Err(AxisError::analysis("k-means: points must not be empty"));
    }
    if config.k > points.len() {
        return Err(AxisError::analysis(format!(
            "k-means: k ({}) must be <= number of points ({})",
            config.k,
            points.len()
        )));
    }
    let dim = points[0].len();
    if points.iter().any(|p| p.len() != dim) {
        return Err(AxisError::invalid_input("k-means: points have unequal widths"));
    }

    let tol_abs = mean_feature_variance(points) * config.tol;
    let mut seeder = ChaCha8Rng::seed_from_u64(config.seed);
    let seeds: Vec<u64> = (0..config.n_init.max(1)).map(|_| seeder.gen()).collect();

    let runs: Vec<KMeansResult> = seeds
        .par_iter()
        .map(|&s| single_run(points, config.k, config.max_iterations, tol_abs, s))
        .collect();

    let best = runs
        .into_iter()
        .reduce(|best, run| if run.inertia < best.inertia { run } else { best })
        .ok_or_else(|| AxisError::analysis("k-means: no restarts were run"))?;

    debug!(
        target: "semaxis::clustering",
        k = config.k,
        n = points.len(),
        restarts = seeds.len(),
        inertia = best.inertia,
        iterations = best.iterations,
        converged = best.converged,
        "k-means finished"
    );
    Ok(best)
}

fn single_run(
    points: &[Vec<f64>],
    k: usize,
    max_iterations: usize,
    tol_abs: f64,
    seed: u64,
) -> KMeansResult {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut centroids = kmeans_plus_plus_init(points, k, &mut rng);
    let mut labels = assign_labels(points, &centroids);
    let mut iterations = 0;
    let mut converged = false;

    for iter in 0..max_iterations {
        iterations = iter + 1;
        let new_centroids = compute_centroids(points, &labels, &centroids);
        let shift: f64 = centroids
            .iter()
            .zip(new_centroids.iter())
            .map(|(old, new)| squared_euclidean(old, new))
            .sum();
        centroids = new_centroids;

        let new_labels = assign_labels(points, &centroids);
        let stable = new_labels == labels;
        labels = new_labels;
        if stable || shift <= tol_abs {
            converged = true;
            break;
        }
    }

    let inertia = points
        .iter()
        .zip(labels.iter())
        .map(|(p, &l)| squared_euclidean(p, &centroids[l]))
        .sum();

    KMeansResult {
        labels,
        centroids,
        inertia,
        iterations,
        converged,
    }
}

/// Greedy k-means++ initialization.
fn kmeans_plus_plus_init(points: &[Vec<f64>], k: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    let n = points.len();
    let trials = 2 + (k as f64).ln().floor() as usize;
    let mut centroids = Vec::with_capacity(k);

    let first = rng.gen_range(0..n);
    centroids.push(points[first].clone());
    let mut closest: Vec<f64> = points
        .iter()
        .map(|p| squared_euclidean(p, &points[first]))
        .collect();

    while centroids.len() < k {
        let total: f64 = closest.iter().sum();
        let mut best_idx = 0;
        let mut best_potential = f64::INFINITY;
        let mut best_closest = Vec::new();

        for _ in 0..trials {
            let candidate = if total > 0.0 {
                sample_weighted(&closest, total, rng)
            } else {
                rng.gen_range(0..n)
            };
            let updated: Vec<f64> = points
                .iter()
                .zip(closest.iter())
                .map(|(p, &c)| c.min(squared_euclidean(p, &points[candidate])))
                .collect();
            let potential: f64 = updated.iter().sum();
            if potential < best_potential {
                best_potential = potential;
                best_idx = candidate;
                best_closest = updated;
            }
        }

        centroids.push(points[best_idx].clone());
        closest = best_closest;
    }
    centroids
}

fn sample_weighted(weights: &[f64], total: f64, rng: &mut ChaCha8Rng) -> usize {
    let target = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative > target {
            return i;
        }
    }
    weights.len() - 1
}

/// Nearest centroid per point by squared Euclidean distance; ties go to the lower index.
fn assign_labels(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    points
        .par_iter()
        .map(|p| {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (j, c) in centroids.iter().enumerate() {
                let d = squared_euclidean(p, c);
                if d < best_dist {
                    best_dist = d;
                    best = j;
                }
            }
            best
        })
        .collect()
}

/// Member means; empty clusters are moved onto the points farthest from their centroid.
fn compute_centroids(points: &[Vec<f64>], labels: &[usize], previous: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let k = previous.len();
    let dim = points[0].len();
    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];
    for (p, &l) in points.iter().zip(labels.iter()) {
        counts[l] += 1;
        for (s, v) in sums[l].iter_mut().zip(p.iter()) {
            *s += v;
        }
    }

    let empty: Vec<usize> = (0..k).filter(|&j| counts[j] == 0).collect();
    let mut centroids: Vec<Vec<f64>> = sums
        .into_iter()
        .zip(counts.iter())
        .map(|(sum, &count)| {
            if count > 0 {
                sum.into_iter().map(|s| s / count as f64).collect()
            } else {
                vec![0.0; dim]
            }
        })
        .collect();

    if !empty.is_empty() {
        let mut far: Vec<(usize, f64)> = points
            .iter()
            .zip(labels.iter())
            .enumerate()
            .map(|(i, (p, &l))| (i, squared_euclidean(p, &previous[l])))
            .collect();
        far.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        for (slot, &j) in empty.iter().enumerate() {
            let idx = far[slot.min(far.len() - 1)].0;
            centroids[j] = points[idx].clone();
        }
    }
    centroids
}

fn mean_feature_variance(points: &[Vec<f64>]) -> f64 {
    let n = points.len() as f64;
    let dim = points[0].len();
    if dim == 0 {
        return 0.0;
    }
    let total: f64 = (0..dim)
        .map(|j| {
            let mean = points.iter().map(|p| p[j]).sum::<f64>() / n;
            points.iter().map(|p| (p[j] - mean) * (p[j] - mean)).sum::<f64>() / n
        })
        .sum();
    total / dim as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
            vec![10.0, 10.1],
        ]
    }

    // =========================================================================
    // Config validation
    // =========================================================================

    #[test]
    fn test_config_rejects_zero_k() {
        let err = KMeansConfig::new(0, 100, 1e-4).unwrap_err();
        assert!(err.to_string().contains("k must be > 0"));
    }

    #[test]
    fn test_config_rejects_bad_tol() {
        assert!(KMeansConfig::new(2, 100, 0.0).is_err());
        assert!(KMeansConfig::new(2, 100, f64::NAN).is_err());
        assert!(KMeansConfig::new(2, 0, 1e-4).is_err());
    }

    // =========================================================================
    // Fitting
    // =========================================================================

    #[test]
    fn test_separates_two_blobs() {
        let points = two_blobs();
        let config = KMeansConfig::new(2, 300, 1e-4).unwrap().with_seed(42);
        let result = kmeans(&points, &config).unwrap();

        assert_eq!(result.labels[0], result.labels[1]);
        assert_eq!(result.labels[0], result.labels[2]);
        assert_eq!(result.labels[3], result.labels[4]);
        assert_ne!(result.labels[0], result.labels[3]);
        assert!(result.converged);
        println!(
            "[VERIFIED] Two blobs separated, inertia={:.4}, iterations={}",
            result.inertia, result.iterations
        );
    }

    #[test]
    fn test_same_seed_same_labels() {
        let points = two_blobs();
        let config = KMeansConfig::new(3, 300, 1e-4).unwrap().with_seed(7);
        let a = kmeans(&points, &config).unwrap();
        let b = kmeans(&points, &config).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn test_k_equal_to_n_uses_every_point() {
        let points = vec![vec![0.0], vec![1.0], vec![2.0]];
        let config = KMeansConfig::new(3, 300, 1e-4).unwrap();
        let result = kmeans(&points, &config).unwrap();

        let mut labels = result.labels.clone();
        labels.sort_unstable();
        assert_eq!(labels, vec![0, 1, 2]);
        assert!(result.inertia.abs() < 1e-12);
    }

    #[test]
    fn test_k_larger_than_n_fails() {
        let points = vec![vec![0.0], vec![1.0]];
        let config = KMeansConfig::new(3, 300, 1e-4).unwrap();
        assert!(kmeans(&points, &config).is_err());
    }

    #[test]
    fn test_duplicate_points_do_not_panic() {
        let points = vec![vec![1.0, 1.0]; 5];
        let config = KMeansConfig::new(2, 50, 1e-4).unwrap();
        let result = kmeans(&points, &config).unwrap();
        assert_eq!(result.labels.len(), 5);
        assert_eq!(result.inertia, 0.0);
    }
}
