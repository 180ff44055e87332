//! Dense-matrix helpers shared by the axis transforms, clustering and metrics.
//!
//! Matrices are `nalgebra::DMatrix<f64>` with one sample per row. Persisted
//! descriptors use row-major `Vec<Vec<f64>>`; the conversions live here.

use nalgebra::DMatrix;

use crate::error::{AxisError, AxisResult};

/// Rows whose norm is below this are left at zero instead of being divided.
pub const NORM_EPS: f64 = 1e-9;

/// Build a matrix from row-major rows, validating shape and finiteness.
pub fn matrix_from_rows(rows: &[Vec<f64>]) -> AxisResult<DMatrix<f64>> {
    let n = rows.len();
    if n == 0 {
        return Err(AxisError::invalid_input("matrix must have at least one row"));
    }
    let d = rows[0].len();
    if d == 0 {
        return Err(AxisError::invalid_input("matrix rows must not be empty"));
    }
    for (idx, row) in rows.iter().enumerate() {
        if row.len() != d {
            return Err(AxisError::invalid_input(format!(
                "row {} has {} columns, expected {}",
                idx,
                row.len(),
                d
            )));
        }
        if let Some(col) = row.iter().position(|v| !v.is_finite()) {
            return Err(AxisError::invalid_input(format!(
                "row {} column {} is not finite",
                idx, col
            )));
        }
    }
    Ok(DMatrix::from_fn(n, d, |i, j| rows[i][j]))
}

/// Copy a matrix out as row-major rows.
pub fn matrix_to_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    (0..m.nrows())
        .map(|i| (0..m.ncols()).map(|j| m[(i, j)]).collect())
        .collect()
}

/// Squared Euclidean distance.
#[inline]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Euclidean distance.
#[inline]
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scale a vector to unit L2 norm (`x / (‖x‖ + eps)`).
pub fn l2_normalize(v: &[f64]) -> Vec<f64> {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt() + NORM_EPS;
    v.iter().map(|x| x / norm).collect()
}

/// Unit-normalize every row of a matrix, returning row-major rows.
pub fn l2_normalize_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    matrix_to_rows(m).iter().map(|r| l2_normalize(r)).collect()
}

/// Column means of a matrix.
pub fn column_means(m: &DMatrix<f64>) -> Vec<f64> {
    let n = m.nrows() as f64;
    (0..m.ncols()).map(|j| m.column(j).sum() / n).collect()
}

/// Population (ddof = 0) standard deviations of the columns.
pub fn column_stds(m: &DMatrix<f64>, means: &[f64]) -> Vec<f64> {
    let n = m.nrows() as f64;
    (0..m.ncols())
        .map(|j| {
            let mean = means[j];
            let var = m.column(j).iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
            var.sqrt()
        })
        .collect()
}

/// Quantile with linear interpolation between order statistics.
///
/// Returns `None` for an empty slice.
pub fn quantile_linear(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_from_rows_rejects_ragged() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        let err = matrix_from_rows(&rows).unwrap_err().to_string();
        assert!(err.contains("row 1"));
    }

    #[test]
    fn test_matrix_from_rows_rejects_nan() {
        let rows = vec![vec![1.0, f64::NAN]];
        assert!(matrix_from_rows(&rows).is_err());
    }

    #[test]
    fn test_rows_roundtrip() {
        let rows = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let m = matrix_from_rows(&rows).unwrap();
        assert_eq!(m[(1, 2)], 6.0);
        assert_eq!(matrix_to_rows(&m), rows);
    }

    #[test]
    fn test_l2_normalize_unit_norm() {
        let v = l2_normalize(&[3.0, 4.0]);
        let norm = (v[0] * v[0] + v[1] * v[1]).sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_stays_zero() {
        let v = l2_normalize(&[0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn test_quantile_linear_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_linear(&values, 0.0), Some(1.0));
        assert_eq!(quantile_linear(&values, 1.0), Some(4.0));
        let q = quantile_linear(&values, 0.5).unwrap();
        assert!((q - 2.5).abs() < 1e-12);
        let q90 = quantile_linear(&values, 0.9).unwrap();
        assert!((q90 - 3.7).abs() < 1e-12);
        assert_eq!(quantile_linear(&[], 0.5), None);
    }

    #[test]
    fn test_column_stats() {
        let m = matrix_from_rows(&[vec![1.0, 10.0], vec![3.0, 10.0]]).unwrap();
        let means = column_means(&m);
        let stds = column_stds(&m, &means);
        assert_eq!(means, vec![2.0, 10.0]);
        assert!((stds[0] - 1.0).abs() < 1e-12);
        assert_eq!(stds[1], 0.0);
    }
}
