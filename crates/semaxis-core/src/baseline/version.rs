//! Version identifiers, centroid sets, manifests and ledger entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::axes::{Stage1Transform, Stage2Transform};
use crate::error::{AxisError, AxisResult};
use crate::explorer::Candidate;

/// Stored rows whose norm differs from 1 by more than this are re-normalized on load.
pub const CENTROID_NORM_TOLERANCE: f64 = 1e-3;

/// Metric family recorded in every manifest.
pub const METRIC_FAMILY: &str = "cosine-spherical";

/// Algorithm version recorded in every manifest.
pub const ALGORITHM_VERSION: &str = concat!("semaxis-", env!("CARGO_PKG_VERSION"));

// =============================================================================
// VersionId
// =============================================================================

/// Monotonic per-project version number, rendered as `v001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionId(pub u32);

impl VersionId {
    pub const FIRST: Self = Self(1);

    #[inline]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{:03}", self.0)
    }
}

impl FromStr for VersionId {
    type Err = AxisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('v')
            .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .map(VersionId)
            .ok_or_else(|| AxisError::invalid_input(format!("invalid version id '{}'", s)))
    }
}

impl Serialize for VersionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// CentroidSet
// =============================================================================

const CENTROID_MAGIC: &[u8; 4] = b"SXC1";
const CENTROID_HEADER_LEN: usize = 12;

/// Unit-normalized centroid rows, stored as `f32`.
///
/// # Binary layout
///
/// `b"SXC1"`, rows as u32 LE, cols as u32 LE, then `rows × cols` f32 LE values.
/// The ledger checksum is the SHA-256 of exactly these bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidSet {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl CentroidSet {
    pub fn from_rows(rows: &[Vec<f64>]) -> AxisResult<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.is_empty() || cols == 0 {
            return Err(AxisError::invalid_input("centroid set must not be empty"));
        }
        if rows.iter().any(|r| r.len() != cols) {
            return Err(AxisError::invalid_input("centroid rows have unequal widths"));
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(AxisError::invalid_input("centroid values must be finite"));
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.iter().flatten().map(|v| *v as f32).collect(),
        })
    }

    /// Number of centroids.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Centroid width (stage-2 axis count).
    #[inline]
    pub fn dim(&self) -> usize {
        self.cols
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Rows widened to `f64`.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows)
            .map(|i| self.row(i).iter().map(|v| *v as f64).collect())
            .collect()
    }

    /// New set with `other`'s rows after this set's rows.
    pub fn append(&self, other: &CentroidSet) -> AxisResult<Self> {
        if other.cols != self.cols {
            return Err(AxisError::invalid_input(format!(
                "cannot append centroids of width {} to width {}",
                other.cols, self.cols
            )));
        }
        let mut data = self.data.clone();
        data.extend_from_slice(&other.data);
        Ok(Self {
            rows: self.rows + other.rows,
            cols: self.cols,
            data,
        })
    }

    /// Re-normalize rows whose norm is off by more than `tolerance`. Returns the count changed.
    pub fn renormalize_if_needed(mut self, tolerance: f64) -> (Self, usize) {
        let mut changed = 0;
        for i in 0..self.rows {
            let row = &mut self.data[i * self.cols..(i + 1) * self.cols];
            let norm = row.iter().map(|v| (*v as f64) * (*v as f64)).sum::<f64>().sqrt();
            if (norm - 1.0).abs() > tolerance {
                let denom = norm + crate::linalg::NORM_EPS;
                row.iter_mut().for_each(|v| *v = (*v as f64 / denom) as f32);
                changed += 1;
            }
        }
        (self, changed)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CENTROID_HEADER_LEN + self.data.len() * 4);
        out.extend_from_slice(CENTROID_MAGIC);
        out.extend_from_slice(&(self.rows as u32).to_le_bytes());
        out.extend_from_slice(&(self.cols as u32).to_le_bytes());
        for v in &self.data {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> AxisResult<Self> {
        let bad = |why: &str| AxisError::serialization("decoding centroids", why);
        if bytes.len() < CENTROID_HEADER_LEN || &bytes[..4] != CENTROID_MAGIC {
            return Err(bad("missing centroid header"));
        }
        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let rows = word(4) as usize;
        let cols = word(8) as usize;
        let body = &bytes[CENTROID_HEADER_LEN..];
        if rows == 0 || cols == 0 || body.len() != rows * cols * 4 {
            return Err(bad(&format!(
                "expected {}x{} values, found {} bytes",
                rows,
                cols,
                body.len()
            )));
        }
        let data = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { rows, cols, data })
    }

    /// Lower-case hex SHA-256 of [`Self::to_bytes`].
    pub fn checksum(&self) -> String {
        format!("{:x}", Sha256::digest(self.to_bytes()))
    }
}

// =============================================================================
// Manifest and ledger
// =============================================================================

/// How a version was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMode {
    First,
    Unlock,
}

/// The candidate a first-run baseline was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    /// Plan number (1-based rank).
    pub rank: usize,
    pub d1: usize,
    pub k: usize,
    pub chosen: Candidate,
}

/// Outcome of an unlock extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    pub q: f64,
    pub add_k: usize,
    /// Distance quantile at `q`; rows at or above it are novel.
    pub threshold: f64,
    pub outlier_count: usize,
    pub added_clusters: usize,
}

/// Host and runtime details recorded with a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub os: String,
    pub arch: String,
    pub crate_version: String,
    /// Inference device reported by the embedding provider.
    pub device: String,
}

impl EnvironmentInfo {
    pub fn current(device: impl Into<String>) -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            device: device.into(),
        }
    }
}

/// Provenance of one baseline version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionManifest {
    pub project: String,
    pub mode: BaselineMode,
    pub created_at: DateTime<Utc>,
    pub algorithm_version: String,
    pub embedding_model: String,
    pub pca_var: f64,
    pub seed: u64,
    pub rank_method: String,
    pub metric_family: String,
    pub centroids_are_normalized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock: Option<ExtensionInfo>,
    /// `project:version` this version was extended from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_from: Option<String>,
    pub environment: EnvironmentInfo,
}

/// One ledger record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub version: VersionId,
    /// SHA-256 of the stored centroid bytes.
    pub sha256: String,
    pub info: VersionManifest,
}

/// Everything needed to create a version.
#[derive(Debug, Clone)]
pub struct VersionDraft {
    pub stage1: Stage1Transform,
    pub stage2: Stage2Transform,
    pub centroids: CentroidSet,
    pub manifest: VersionManifest,
}

impl VersionDraft {
    /// Reject drafts whose parts do not fit together.
    pub fn validate(&self) -> AxisResult<()> {
        self.stage1.validate()?;
        if self.stage2.ica2_components.iter().any(|r| r.len() != self.stage1.axis_count()) {
            return Err(AxisError::invalid_input(
                "stage-2 rotation width differs from the stage-1 axis count",
            ));
        }
        if self.centroids.dim() != self.stage2.axis_count() {
            return Err(AxisError::invalid_input(format!(
                "centroid width {} differs from the stage-2 axis count {}",
                self.centroids.dim(),
                self.stage2.axis_count()
            )));
        }
        Ok(())
    }
}

/// A loaded baseline version.
#[derive(Debug, Clone)]
pub struct BaselineVersion {
    pub project: String,
    pub version: VersionId,
    pub stage1: Stage1Transform,
    pub stage2: Stage2Transform,
    pub centroids: CentroidSet,
    pub manifest: VersionManifest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_id_format_and_parse() {
        assert_eq!(VersionId(1).to_string(), "v001");
        assert_eq!(VersionId(1234).to_string(), "v1234");
        assert_eq!("v007".parse::<VersionId>().unwrap(), VersionId(7));
        assert!("7".parse::<VersionId>().is_err());
        assert!("v".parse::<VersionId>().is_err());
        assert!("v000".parse::<VersionId>().is_err());
        assert!("vx1".parse::<VersionId>().is_err());
    }

    #[test]
    fn test_version_id_serde_as_string() {
        let json = serde_json::to_string(&VersionId(3)).unwrap();
        assert_eq!(json, "\"v003\"");
        let back: VersionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VersionId(3));
    }

    #[test]
    fn test_centroid_bytes_roundtrip_and_checksum() {
        let set = CentroidSet::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let bytes = set.to_bytes();
        assert_eq!(bytes.len(), 12 + 4 * 4);

        let back = CentroidSet::from_bytes(&bytes).unwrap();
        assert_eq!(back, set);
        assert_eq!(back.checksum(), set.checksum());
        assert_eq!(set.checksum().len(), 64);
        println!("[VERIFIED] Centroid checksum: {}", set.checksum());
    }

    #[test]
    fn test_centroid_bytes_reject_truncation() {
        let set = CentroidSet::from_rows(&[vec![1.0, 0.0]]).unwrap();
        let bytes = set.to_bytes();
        assert!(CentroidSet::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        assert!(CentroidSet::from_bytes(b"nope").is_err());
    }

    #[test]
    fn test_renormalize_only_off_rows() {
        let set = CentroidSet::from_rows(&[vec![1.0, 0.0], vec![3.0, 4.0]]).unwrap();
        let (fixed, changed) = set.renormalize_if_needed(CENTROID_NORM_TOLERANCE);

        assert_eq!(changed, 1);
        assert_eq!(fixed.row(0), &[1.0, 0.0]);
        assert!((fixed.row(1)[0] - 0.6).abs() < 1e-6);
        assert!((fixed.row(1)[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_append_preserves_order() {
        let a = CentroidSet::from_rows(&[vec![1.0, 0.0]]).unwrap();
        let b = CentroidSet::from_rows(&[vec![0.0, 1.0]]).unwrap();
        let both = a.append(&b).unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(both.row(0), a.row(0));
        assert_eq!(both.row(1), b.row(0));

        let wide = CentroidSet::from_rows(&[vec![0.0, 0.0, 1.0]]).unwrap();
        assert!(a.append(&wide).is_err());
    }
}
