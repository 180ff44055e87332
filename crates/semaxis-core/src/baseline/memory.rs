//! In-memory baseline repository.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::info;

use super::version::{BaselineVersion, LedgerEntry, VersionDraft, VersionId};
use super::{normalize_loaded_centroids, BaselineRepository};
use crate::error::{AxisError, AxisResult};

#[derive(Debug, Default)]
struct ProjectHistory {
    versions: BTreeMap<VersionId, BaselineVersion>,
    ledger: Vec<LedgerEntry>,
    /// Logical modification time.
    modified: u64,
}

/// Thread-safe repository backed by a map; modification order uses a logical clock.
#[derive(Debug, Default)]
pub struct InMemoryBaselineRepository {
    projects: RwLock<HashMap<String, ProjectHistory>>,
    clock: AtomicU64,
}

impl InMemoryBaselineRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaselineRepository for InMemoryBaselineRepository {
    fn create_version(&self, project: &str, draft: &VersionDraft) -> AxisResult<VersionId> {
        draft.validate()?;
        let mut projects = self.projects.write();
        let history = projects.entry(project.to_string()).or_default();
        let version = history
            .versions
            .keys()
            .next_back()
            .map(|v| v.next())
            .unwrap_or(VersionId::FIRST);

        history.versions.insert(
            version,
            BaselineVersion {
                project: project.to_string(),
                version,
                stage1: draft.stage1.clone(),
                stage2: draft.stage2.clone(),
                centroids: draft.centroids.clone(),
                manifest: draft.manifest.clone(),
            },
        );
        history.ledger.push(LedgerEntry {
            version,
            sha256: draft.centroids.checksum(),
            info: draft.manifest.clone(),
        });
        history.modified = self.clock.fetch_add(1, Ordering::SeqCst) + 1;

        info!(
            target: "semaxis::baseline",
            project = project,
            version = %version,
            centroids = draft.centroids.len(),
            "Created baseline version (memory)"
        );
        Ok(version)
    }

    fn list_versions(&self, project: &str) -> AxisResult<Vec<VersionId>> {
        Ok(self
            .projects
            .read()
            .get(project)
            .map(|h| h.versions.keys().copied().collect())
            .unwrap_or_default())
    }

    fn load_version(&self, project: &str, version: Option<VersionId>) -> AxisResult<BaselineVersion> {
        let projects = self.projects.read();
        let history = projects
            .get(project)
            .filter(|h| !h.versions.is_empty())
            .ok_or_else(|| AxisError::BaselineNotFound {
                project: project.to_string(),
            })?;
        let found = match version {
            Some(v) => history.versions.get(&v),
            None => history.versions.values().next_back(),
        };
        let mut loaded = found.cloned().ok_or_else(|| AxisError::VersionNotFound {
            project: project.to_string(),
            version: version.map(|v| v.to_string()).unwrap_or_default(),
        })?;
        loaded.centroids = normalize_loaded_centroids(loaded.centroids, project, loaded.version);
        Ok(loaded)
    }

    fn ledger(&self, project: &str) -> AxisResult<Vec<LedgerEntry>> {
        Ok(self
            .projects
            .read()
            .get(project)
            .map(|h| h.ledger.clone())
            .unwrap_or_default())
    }

    fn list_projects_with_history(&self) -> AxisResult<Vec<String>> {
        let mut names: Vec<String> = self
            .projects
            .read()
            .iter()
            .filter(|(_, h)| !h.versions.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn most_recently_modified(&self) -> AxisResult<Option<String>> {
        Ok(self
            .projects
            .read()
            .iter()
            .filter(|(_, h)| !h.versions.is_empty())
            .max_by_key(|(_, h)| h.modified)
            .map(|(name, _)| name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_draft;

    #[test]
    fn test_versions_are_monotonic() {
        let repo = InMemoryBaselineRepository::new();
        for _ in 0..4 {
            repo.create_version("alpha", &sample_draft("alpha")).unwrap();
        }
        let versions = repo.list_versions("alpha").unwrap();
        assert_eq!(
            versions,
            vec![VersionId(1), VersionId(2), VersionId(3), VersionId(4)]
        );
        assert_eq!(repo.ledger("alpha").unwrap().len(), 4);
    }

    #[test]
    fn test_load_latest_and_specific() {
        let repo = InMemoryBaselineRepository::new();
        repo.create_version("alpha", &sample_draft("alpha")).unwrap();
        repo.create_version("alpha", &sample_draft("alpha")).unwrap();

        assert_eq!(repo.load_version("alpha", None).unwrap().version, VersionId(2));
        assert_eq!(
            repo.load_version("alpha", Some(VersionId(1))).unwrap().version,
            VersionId(1)
        );
        assert!(matches!(
            repo.load_version("alpha", Some(VersionId(9))).unwrap_err(),
            AxisError::VersionNotFound { .. }
        ));
        assert!(matches!(
            repo.load_version("beta", None).unwrap_err(),
            AxisError::BaselineNotFound { .. }
        ));
    }

    #[test]
    fn test_most_recently_modified_tracks_writes() {
        let repo = InMemoryBaselineRepository::new();
        assert_eq!(repo.most_recently_modified().unwrap(), None);

        repo.create_version("a", &sample_draft("a")).unwrap();
        repo.create_version("b", &sample_draft("b")).unwrap();
        assert_eq!(repo.most_recently_modified().unwrap().as_deref(), Some("b"));

        repo.create_version("a", &sample_draft("a")).unwrap();
        assert_eq!(repo.most_recently_modified().unwrap().as_deref(), Some("a"));
        assert_eq!(repo.list_projects_with_history().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_draft_is_rejected() {
        let repo = InMemoryBaselineRepository::new();
        let mut draft = sample_draft("a");
        draft.stage2.ica2_n_components = 3;
        assert!(repo.create_version("a", &draft).is_err());
        assert!(repo.list_versions("a").unwrap().is_empty());
    }
}
