//! Nearest-centroid assignment by cosine distance.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AxisError, AxisResult};
use crate::linalg::dot;

/// Per-row cluster id and distance to that cluster's centroid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub cluster_ids: Vec<usize>,
    /// Cosine distance to the assigned centroid.
    pub distances: Vec<f64>,
}

impl Assignment {
    #[inline]
    pub fn len(&self) -> usize {
        self.cluster_ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cluster_ids.is_empty()
    }
}

/// Cosine distance `1 − cos(a, b)`; a zero vector is at distance 1 from everything.
#[inline]
pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    let na = dot(a, a).sqrt();
    let nb = dot(b, b).sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    (1.0 - dot(a, b) / (na * nb)).max(0.0)
}

/// Distance from every point to every centroid (`n × k`, row-major).
pub fn cosine_distance_matrix(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<Vec<f64>> {
    points
        .par_iter()
        .map(|p| centroids.iter().map(|c| cosine_distance(p, c)).collect())
        .collect()
}

/// Assign each point to its nearest centroid; ties go to the lowest centroid index.
///
/// # Errors
///
/// `AxisError::InvalidInput` when there are no centroids or the widths differ.
pub fn assign_nearest(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> AxisResult<Assignment> {
    if centroids.is_empty() {
        return Err(AxisError::invalid_input("cannot assign without centroids"));
    }
    let width = centroids[0].len();
    if centroids.iter().any(|c| c.len() != width) {
        return Err(AxisError::invalid_input("centroids have unequal widths"));
    }
    if let Some(p) = points.iter().find(|p| p.len() != width) {
        return Err(AxisError::invalid_input(format!(
            "point width {} does not match centroid width {}",
            p.len(),
            width
        )));
    }

    let (cluster_ids, distances) = cosine_distance_matrix(points, centroids)
        .into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .fold((0usize, f64::INFINITY), |(bi, bd), (i, d)| {
                    if d < bd {
                        (i, d)
                    } else {
                        (bi, bd)
                    }
                })
        })
        .unzip();

    Ok(Assignment {
        cluster_ids,
        distances,
    })
}

/// Per-row distance to the nearest centroid.
pub fn min_distances(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> AxisResult<Vec<f64>> {
    Ok(assign_nearest(points, centroids)?.distances)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assigns_by_angle_not_magnitude() {
        let centroids = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let points = vec![vec![10.0, 1.0], vec![0.1, 0.2]];
        let a = assign_nearest(&points, &centroids).unwrap();

        assert_eq!(a.cluster_ids, vec![0, 1]);
        assert!(a.distances.iter().all(|d| *d >= 0.0 && *d <= 2.0));
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        let centroids = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let a = assign_nearest(&[vec![1.0, 1.0]], &centroids).unwrap();
        assert_eq!(a.cluster_ids, vec![0]);
    }

    #[test]
    fn test_assignment_is_idempotent() {
        let centroids = vec![vec![0.6, 0.8], vec![-1.0, 0.0], vec![0.0, -1.0]];
        let points: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                let t = i as f64 * 0.31;
                vec![t.cos(), t.sin()]
            })
            .collect();

        let first = assign_nearest(&points, &centroids).unwrap();
        let second = assign_nearest(&points, &centroids).unwrap();
        assert_eq!(first, second);
        println!("[VERIFIED] Repeated assignment is identical for {} rows", first.len());
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let err = assign_nearest(&[vec![1.0, 0.0, 0.0]], &[vec![1.0, 0.0]]).unwrap_err();
        assert!(matches!(err, AxisError::InvalidInput(_)));
    }
}
