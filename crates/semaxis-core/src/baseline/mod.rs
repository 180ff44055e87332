//! Baseline Store: append-only, versioned axis transforms and centroid sets.
//!
//! # Invariants
//!
//! - Versions are never mutated or deleted; creating a version appends
//! - Version ids are strictly increasing per project and never reused
//! - The ledger lists every published version with its centroid checksum
//!
//! Storage backends implement [`BaselineRepository`]. The run controller only
//! talks to this trait, so tests use [`InMemoryBaselineRepository`] and the
//! CLI uses the filesystem repository from `semaxis-storage`.

mod memory;
mod version;

pub use memory::InMemoryBaselineRepository;
pub use version::{
    BaselineMode, BaselineVersion, CentroidSet, EnvironmentInfo, ExtensionInfo, LedgerEntry,
    PlanRecord, VersionDraft, VersionId, VersionManifest, ALGORITHM_VERSION,
    CENTROID_NORM_TOLERANCE, METRIC_FAMILY,
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AxisError, AxisResult};

/// Persistence contract for baselines.
pub trait BaselineRepository: Send + Sync {
    /// Append a new version under `project` and record it in the ledger.
    fn create_version(&self, project: &str, draft: &VersionDraft) -> AxisResult<VersionId>;

    /// All version ids of `project`, ascending. Empty when the project has none.
    fn list_versions(&self, project: &str) -> AxisResult<Vec<VersionId>>;

    /// Load a version (the latest when `version` is `None`).
    ///
    /// # Errors
    ///
    /// - `AxisError::BaselineNotFound` when the project has no versions
    /// - `AxisError::VersionNotFound` when the requested id does not exist
    fn load_version(&self, project: &str, version: Option<VersionId>) -> AxisResult<BaselineVersion>;

    /// Ledger records of `project`, in publication order.
    fn ledger(&self, project: &str) -> AxisResult<Vec<LedgerEntry>>;

    /// Projects with at least one version.
    fn list_projects_with_history(&self) -> AxisResult<Vec<String>>;

    /// The project with history that was modified last.
    fn most_recently_modified(&self) -> AxisResult<Option<String>>;

    fn latest_version(&self, project: &str) -> AxisResult<Option<VersionId>> {
        Ok(self.list_versions(project)?.last().copied())
    }
}

/// Re-normalize loaded centroids, warning when anything changed.
pub fn normalize_loaded_centroids(centroids: CentroidSet, project: &str, version: VersionId) -> CentroidSet {
    let (centroids, changed) = centroids.renormalize_if_needed(CENTROID_NORM_TOLERANCE);
    if changed > 0 {
        warn!(
            target: "semaxis::baseline",
            project = project,
            version = %version,
            rows = changed,
            "Stored centroids were not unit length; re-normalized"
        );
    }
    centroids
}

/// Where a resolved baseline came from, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    /// Explicitly named by the caller.
    External,
    /// The current project's own history.
    Current,
    /// Most recently modified baseline elsewhere in the workspace.
    Discovered,
}

/// Baseline chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedBaseline {
    pub project: String,
    pub version: VersionId,
    pub source: BaselineSource,
}

/// Apply the selection priority: explicit external, own history, most recent elsewhere.
///
/// Returns `Ok(None)` when no baseline exists anywhere (a first run).
///
/// # Errors
///
/// `AxisError::Configuration` when `external` names a project without history.
pub fn resolve_baseline<R: BaselineRepository + ?Sized>(
    repo: &R,
    current_project: &str,
    external: Option<&str>,
) -> AxisResult<Option<ResolvedBaseline>> {
    let resolved = if let Some(name) = external {
        let version = repo.latest_version(name)?.ok_or_else(|| {
            AxisError::configuration(format!("baseline '{}' named for reuse was not found", name))
        })?;
        Some(ResolvedBaseline {
            project: name.to_string(),
            version,
            source: BaselineSource::External,
        })
    } else if let Some(version) = repo.latest_version(current_project)? {
        Some(ResolvedBaseline {
            project: current_project.to_string(),
            version,
            source: BaselineSource::Current,
        })
    } else if let Some(project) = repo.most_recently_modified()? {
        let version = repo
            .latest_version(&project)?
            .ok_or_else(|| AxisError::BaselineNotFound {
                project: project.clone(),
            })?;
        Some(ResolvedBaseline {
            project,
            version,
            source: BaselineSource::Discovered,
        })
    } else {
        None
    };

    if let Some(r) = &resolved {
        info!(
            target: "semaxis::baseline",
            project = %r.project,
            version = %r.version,
            source = ?r.source,
            "Resolved baseline"
        );
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_draft;

    #[test]
    fn test_resolve_none_when_empty() {
        let repo = InMemoryBaselineRepository::new();
        assert_eq!(resolve_baseline(&repo, "alpha", None).unwrap(), None);
    }

    #[test]
    fn test_resolve_priority_order() {
        let repo = InMemoryBaselineRepository::new();
        repo.create_version("other", &sample_draft("other")).unwrap();
        repo.create_version("alpha", &sample_draft("alpha")).unwrap();
        repo.create_version("third", &sample_draft("third")).unwrap();

        let external = resolve_baseline(&repo, "alpha", Some("other")).unwrap().unwrap();
        assert_eq!(external.source, BaselineSource::External);
        assert_eq!(external.project, "other");

        let own = resolve_baseline(&repo, "alpha", None).unwrap().unwrap();
        assert_eq!(own.source, BaselineSource::Current);
        assert_eq!(own.project, "alpha");

        let discovered = resolve_baseline(&repo, "fresh", None).unwrap().unwrap();
        assert_eq!(discovered.source, BaselineSource::Discovered);
        assert_eq!(discovered.project, "third");
        println!("[VERIFIED] Selection priority external > current > discovered");
    }

    #[test]
    fn test_missing_external_is_configuration_error() {
        let repo = InMemoryBaselineRepository::new();
        repo.create_version("alpha", &sample_draft("alpha")).unwrap();
        let err = resolve_baseline(&repo, "alpha", Some("ghost")).unwrap_err();
        assert!(err.is_configuration());
    }
}
