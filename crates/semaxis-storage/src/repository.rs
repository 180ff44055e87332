//! Filesystem implementation of [`BaselineRepository`].
//!
//! # Publish protocol
//!
//! 1. Write all four version files into a staging directory under `history/`
//! 2. Rename the staging directory to `vNNN`
//! 3. Rewrite `ledger.json` through a temporary file and a rename
//!
//! The ledger is the authoritative index. A crash before step 3 leaves an
//! orphan `vNNN` directory that is never listed or loaded; its id is still
//! skipped when the next version is allocated, so ids are never reused.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use semaxis_core::axes::{Stage1Transform, Stage2Transform};
use semaxis_core::baseline::{
    normalize_loaded_centroids, BaselineRepository, BaselineVersion, CentroidSet, LedgerEntry,
    VersionDraft, VersionId, VersionManifest,
};
use semaxis_core::{AxisError, AxisResult};

use crate::layout::{
    check_project_name, project_from_dir_name, read_bytes, read_json, write_atomic, write_json,
    write_synced, ProjectLayout, CENTROIDS_FILE, MANIFEST_FILE, STAGE1_FILE, STAGE2_FILE,
};

/// Baseline store rooted at a results directory.
#[derive(Debug)]
pub struct FsBaselineRepository {
    root: PathBuf,
    /// Serializes version creation within this process.
    write_lock: Mutex<()>,
}

impl FsBaselineRepository {
    /// Open a store at `root`.
    ///
    /// Nothing is created on disk until the first version is written.
    pub fn open(root: impl Into<PathBuf>) -> AxisResult<Self> {
        let root = root.into();
        if root.exists() && !root.is_dir() {
            return Err(AxisError::invalid_input(format!(
                "store root {} is not a directory",
                root.display()
            )));
        }
        info!(target: "semaxis::storage", root = %root.display(), "Opened baseline store");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn layout(&self, project: &str) -> AxisResult<ProjectLayout> {
        check_project_name(project)?;
        Ok(ProjectLayout::new(&self.root, project))
    }

    fn read_ledger(layout: &ProjectLayout) -> AxisResult<Vec<LedgerEntry>> {
        let path = layout.ledger();
        if !path.is_file() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }

    fn warn_orphans(project: &str, layout: &ProjectLayout, ledger: &[LedgerEntry]) -> AxisResult<()> {
        let orphans: Vec<String> = layout
            .version_dirs()?
            .into_iter()
            .filter(|v| !ledger.iter().any(|e| e.version == *v))
            .map(|v| v.to_string())
            .collect();
        if !orphans.is_empty() {
            warn!(
                target: "semaxis::storage",
                project = project,
                orphans = ?orphans,
                "Version directories missing from the ledger are ignored"
            );
        }
        Ok(())
    }

    fn ledger_modified(&self, project: &str) -> Option<SystemTime> {
        let layout = ProjectLayout::new(&self.root, project);
        fs::metadata(layout.ledger()).and_then(|m| m.modified()).ok()
    }
}

fn write_version_files(dir: &Path, draft: &VersionDraft) -> AxisResult<()> {
    write_json(&dir.join(STAGE1_FILE), &draft.stage1)?;
    write_json(&dir.join(STAGE2_FILE), &draft.stage2)?;
    write_synced(&dir.join(CENTROIDS_FILE), &draft.centroids.to_bytes())?;
    write_json(&dir.join(MANIFEST_FILE), &draft.manifest)
}

impl BaselineRepository for FsBaselineRepository {
    fn create_version(&self, project: &str, draft: &VersionDraft) -> AxisResult<VersionId> {
        draft.validate()?;
        let layout = self.layout(project)?;
        let _guard = self.write_lock.lock();

        let history = layout.history();
        fs::create_dir_all(&history)
            .map_err(|e| AxisError::io(format!("creating {}", history.display()), e))?;

        let mut ledger = Self::read_ledger(&layout)?;
        let highest = ledger
            .iter()
            .map(|e| e.version)
            .chain(layout.version_dirs()?)
            .max();
        let version = highest.map(VersionId::next).unwrap_or(VersionId::FIRST);

        let staging = layout.staging_dir(version);
        fs::create_dir_all(&staging)
            .map_err(|e| AxisError::io(format!("creating {}", staging.display()), e))?;
        if let Err(e) = write_version_files(&staging, draft) {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                debug!(target: "semaxis::storage", error = %cleanup, "Could not remove staging directory");
            }
            return Err(e);
        }

        let target = layout.version_dir(version);
        fs::rename(&staging, &target)
            .map_err(|e| AxisError::io(format!("publishing {}", target.display()), e))?;

        ledger.push(LedgerEntry {
            version,
            sha256: draft.centroids.checksum(),
            info: draft.manifest.clone(),
        });
        let bytes = serde_json::to_vec_pretty(&ledger)
            .map_err(|e| AxisError::serialization("encoding ledger", e))?;
        write_atomic(&layout.ledger(), &bytes)?;

        info!(
            target: "semaxis::storage",
            project = project,
            version = %version,
            centroids = draft.centroids.len(),
            path = %target.display(),
            "Created baseline version"
        );
        Ok(version)
    }

    fn list_versions(&self, project: &str) -> AxisResult<Vec<VersionId>> {
        let layout = self.layout(project)?;
        let ledger = Self::read_ledger(&layout)?;
        Self::warn_orphans(project, &layout, &ledger)?;
        let mut versions: Vec<VersionId> = ledger.iter().map(|e| e.version).collect();
        versions.sort();
        Ok(versions)
    }

    fn load_version(&self, project: &str, version: Option<VersionId>) -> AxisResult<BaselineVersion> {
        let layout = self.layout(project)?;
        let ledger = Self::read_ledger(&layout)?;
        let entry = match version {
            Some(v) => ledger.iter().find(|e| e.version == v),
            None => ledger.iter().max_by_key(|e| e.version),
        };
        let entry = match (entry, version) {
            (Some(e), _) => e,
            (None, _) if ledger.is_empty() => {
                return Err(AxisError::BaselineNotFound {
                    project: project.to_string(),
                })
            }
            (None, requested) => {
                return Err(AxisError::VersionNotFound {
                    project: project.to_string(),
                    version: requested.map(|v| v.to_string()).unwrap_or_default(),
                })
            }
        };

        let dir = layout.version_dir(entry.version);
        let stage1: Stage1Transform = read_json(&dir.join(STAGE1_FILE))?;
        stage1.validate()?;
        let stage2: Stage2Transform = read_json(&dir.join(STAGE2_FILE))?;
        let manifest: VersionManifest = read_json(&dir.join(MANIFEST_FILE))?;
        let centroids = CentroidSet::from_bytes(&read_bytes(&dir.join(CENTROIDS_FILE))?)?;

        let checksum = centroids.checksum();
        if checksum != entry.sha256 {
            warn!(
                target: "semaxis::storage",
                project = project,
                version = %entry.version,
                checksum = %checksum,
                ledger = %entry.sha256,
                "Centroid checksum differs from ledger; loading edited centroids"
            );
        }

        debug!(
            target: "semaxis::storage",
            project = project,
            version = %entry.version,
            "Loaded baseline version"
        );
        Ok(BaselineVersion {
            project: project.to_string(),
            version: entry.version,
            stage1,
            stage2,
            centroids: normalize_loaded_centroids(centroids, project, entry.version),
            manifest,
        })
    }

    fn ledger(&self, project: &str) -> AxisResult<Vec<LedgerEntry>> {
        Self::read_ledger(&self.layout(project)?)
    }

    fn list_projects_with_history(&self) -> AxisResult<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root)
            .map_err(|e| AxisError::io(format!("listing {}", self.root.display()), e))?;
        let mut projects = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| AxisError::io(format!("listing {}", self.root.display()), e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(project) = name.to_str().and_then(project_from_dir_name) else {
                continue;
            };
            if check_project_name(project).is_err() {
                continue;
            }
            if !Self::read_ledger(&ProjectLayout::new(&self.root, project))?.is_empty() {
                projects.push(project.to_string());
            }
        }
        projects.sort();
        Ok(projects)
    }

    fn most_recently_modified(&self) -> AxisResult<Option<String>> {
        let projects = self.list_projects_with_history()?;
        Ok(projects
            .into_iter()
            .map(|p| (self.ledger_modified(&p), p))
            .max_by(|(ta, a), (tb, b)| ta.cmp(tb).then_with(|| b.cmp(a)))
            .map(|(_, p)| p))
    }
}
