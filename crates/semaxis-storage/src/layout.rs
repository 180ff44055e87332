//! On-disk layout of a baseline store and the low-level file helpers.
//!
//! ```text
//! <root>/
//!   baseline_<project>/
//!     ledger.json              authoritative list of published versions
//!     history/
//!       v001/
//!         stage1.json
//!         stage2.json
//!         centroids.f32
//!         manifest.json
//!       .staging-v002-<uuid>/  in-progress write, never read
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use semaxis_core::baseline::VersionId;
use semaxis_core::{AxisError, AxisResult};

pub const PROJECT_DIR_PREFIX: &str = "baseline_";
pub const HISTORY_DIR: &str = "history";
pub const LEDGER_FILE: &str = "ledger.json";
pub const STAGE1_FILE: &str = "stage1.json";
pub const STAGE2_FILE: &str = "stage2.json";
pub const CENTROIDS_FILE: &str = "centroids.f32";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const STAGING_PREFIX: &str = ".staging-";

/// Paths of one project's baseline.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: &Path, project: &str) -> Self {
        Self {
            dir: root.join(format!("{}{}", PROJECT_DIR_PREFIX, project)),
        }
    }

    pub fn history(&self) -> PathBuf {
        self.dir.join(HISTORY_DIR)
    }

    pub fn ledger(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE)
    }

    pub fn version_dir(&self, version: VersionId) -> PathBuf {
        self.history().join(version.to_string())
    }

    pub fn staging_dir(&self, version: VersionId) -> PathBuf {
        self.history().join(format!(
            "{}{}-{}",
            STAGING_PREFIX,
            version,
            uuid::Uuid::new_v4().simple()
        ))
    }

    /// Version directories present under `history/`, ascending. Staging directories are skipped.
    pub fn version_dirs(&self) -> AxisResult<Vec<VersionId>> {
        let history = self.history();
        if !history.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&history)
            .map_err(|e| AxisError::io(format!("listing {}", history.display()), e))?;
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| AxisError::io(format!("listing {}", history.display()), e))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(v) = entry.file_name().to_str().and_then(|n| n.parse::<VersionId>().ok()) {
                versions.push(v);
            }
        }
        versions.sort();
        Ok(versions)
    }
}

/// Project name from a `baseline_<project>` directory name.
pub fn project_from_dir_name(name: &str) -> Option<&str> {
    name.strip_prefix(PROJECT_DIR_PREFIX).filter(|p| !p.is_empty())
}

/// Reject names that would escape the store root.
pub fn check_project_name(project: &str) -> AxisResult<()> {
    if project.is_empty()
        || project == "."
        || project == ".."
        || project.contains(['/', '\\'])
    {
        return Err(AxisError::invalid_input(format!(
            "'{}' is not a usable project name",
            project
        )));
    }
    Ok(())
}

/// Write `bytes` to `path` and fsync.
pub fn write_synced(path: &Path, bytes: &[u8]) -> AxisResult<()> {
    let mut file = File::create(path)
        .map_err(|e| AxisError::io(format!("creating {}", path.display()), e))?;
    file.write_all(bytes)
        .map_err(|e| AxisError::io(format!("writing {}", path.display()), e))?;
    file.sync_all()
        .map_err(|e| AxisError::io(format!("syncing {}", path.display()), e))
}

/// Replace `path` through a temporary sibling and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> AxisResult<()> {
    let temp = path.with_extension("tmp");
    write_synced(&temp, bytes)?;
    fs::rename(&temp, path).map_err(|e| {
        AxisError::io(format!("renaming {} to {}", temp.display(), path.display()), e)
    })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> AxisResult<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| AxisError::serialization(format!("encoding {}", path.display()), e))?;
    write_synced(path, &bytes)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> AxisResult<T> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AxisError::serialization(format!("decoding {}", path.display()), e))
}

pub fn read_bytes(path: &Path) -> AxisResult<Vec<u8>> {
    fs::read(path).map_err(|e| AxisError::io(format!("reading {}", path.display()), e))
}
