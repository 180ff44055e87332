//! Run Controller: first-run, lock and unlock flows.
//!
//! # State machine
//!
//! ```text
//!                  ┌─ candidates-only ──> CandidatesOnly (explore + shortlist, no persistence)
//! no baseline ─────┤
//!                  └─ default ──────────> Commit (explore, pick plan, persist v001)
//!
//! baseline found ──┬─ default ──────────> Lock   (apply, assign, no persistence)
//!                  └─ unlock ───────────> Unlock (apply, extend, persist new version)
//!
//! no baseline + unlock ─> AxisError::Configuration
//! ```
//!
//! The controller never touches storage directly; it goes through the
//! injected [`BaselineRepository`].

mod extend;

pub use extend::{extend_centroids, Extension};

use chrono::{DateTime, Utc};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::baseline::{
    resolve_baseline, BaselineMode, BaselineRepository, BaselineSource, BaselineVersion,
    CentroidSet, EnvironmentInfo, ExtensionInfo, PlanRecord, ResolvedBaseline, VersionDraft,
    VersionId, VersionManifest, ALGORITHM_VERSION, METRIC_FAMILY,
};
use crate::clustering::{assign_nearest, Assignment};
use crate::config::{validate_unlock_quantile, Config};
use crate::error::{AxisError, AxisResult};
use crate::explorer::{
    Candidate, CandidateExplorer, Exploration, ShortlistEvaluation, MIN_ROWS, RANK_METHOD,
};
use crate::linalg::{l2_normalize_rows, matrix_to_rows};

/// Below `max(SMALL_SAMPLE_FLOOR, 3·k_max)` rows the exploration is coarse.
pub const SMALL_SAMPLE_FLOOR: usize = 30;

/// Mode selectors for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub project: String,
    pub unlock: bool,
    pub candidates_only: bool,
    /// 1-based plan number to commit; `None` commits the global best.
    pub use_plan: Option<usize>,
    /// Reuse another project's baseline (highest selection priority).
    pub baseline_from: Option<String>,
    pub unlock_q: f64,
    pub unlock_add_k: usize,
    /// Embedding model id for provenance.
    pub embedding_model: String,
    /// Device reported by the embedding provider.
    pub device: String,
}

impl RunOptions {
    /// Options for `project` with unlock parameters and model taken from `config`.
    pub fn new(project: impl Into<String>, config: &Config) -> Self {
        Self {
            project: project.into(),
            unlock: false,
            candidates_only: false,
            use_plan: None,
            baseline_from: None,
            unlock_q: config.unlock.q,
            unlock_add_k: config.unlock.add_k,
            embedding_model: config.embedding.model.clone(),
            device: "unknown".to_string(),
        }
    }
}

/// Terminal run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    CandidatesOnly,
    Commit,
    Lock,
    Unlock,
}

impl RunMode {
    /// True for modes that append a baseline version.
    pub fn persists(&self) -> bool {
        matches!(self, Self::Commit | Self::Unlock)
    }
}

/// Decided before embeddings are computed.
#[derive(Debug, Clone, PartialEq)]
pub enum RunPlan {
    CandidatesOnly,
    Commit { plan: Option<usize> },
    Lock { baseline: ResolvedBaseline },
    Unlock { baseline: ResolvedBaseline, q: f64, add_k: usize },
}

impl RunPlan {
    pub fn mode(&self) -> RunMode {
        match self {
            Self::CandidatesOnly => RunMode::CandidatesOnly,
            Self::Commit { .. } => RunMode::Commit,
            Self::Lock { .. } => RunMode::Lock,
            Self::Unlock { .. } => RunMode::Unlock,
        }
    }

    pub fn baseline(&self) -> Option<&ResolvedBaseline> {
        match self {
            Self::Lock { baseline } | Self::Unlock { baseline, .. } => Some(baseline),
            _ => None,
        }
    }
}

/// Stage-2 coordinates and final assignment per input row.
#[derive(Debug, Clone)]
pub struct ScoredAssignment {
    /// Stage-2 coordinates (`n × d2`), row-major.
    pub coords: Vec<Vec<f64>>,
    pub assignment: Assignment,
    /// Unlock runs: row was novel under the existing centroids.
    pub novel: Option<Vec<bool>>,
}

/// Run summary written as the run manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub n: usize,
    pub project: String,
    pub mode: RunMode,
    /// Version written by this run, or the version applied in lock mode.
    pub used_version: Option<VersionId>,
    pub base_project: Option<String>,
    pub base_version: Option<VersionId>,
    pub base_source: Option<BaselineSource>,
    pub plan: Option<usize>,
    pub d1: Option<usize>,
    pub k: Option<usize>,
    pub d2: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates_top5: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock: Option<ExtensionInfo>,
    pub rank_method: String,
    pub metric_family: String,
    pub centroids_are_normalized: bool,
    pub embedding_model: String,
    pub device: String,
}

/// Everything a run produced, for export.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    /// Absent only for candidates-only runs.
    pub scored: Option<ScoredAssignment>,
    /// First runs only.
    pub exploration: Option<Exploration>,
    /// Candidates-only runs.
    pub shortlist: Option<ShortlistEvaluation>,
}

/// Orchestrates a run against an injected baseline repository.
pub struct RunController<R: BaselineRepository> {
    repo: R,
    config: Config,
    explorer: CandidateExplorer,
}

impl<R: BaselineRepository> RunController<R> {
    pub fn new(repo: R, config: Config) -> Self {
        let explorer = CandidateExplorer::new(config.analysis.clone());
        Self {
            repo,
            config,
            explorer,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decide the run mode from the options and the repository contents.
    ///
    /// # Errors
    ///
    /// `AxisError::Configuration` for an invalid unlock quantile, a missing
    /// external baseline, or unlock with no resolvable baseline.
    pub fn plan_run(&self, options: &RunOptions) -> AxisResult<RunPlan> {
        validate_unlock_quantile(options.unlock_q)?;
        let resolved = resolve_baseline(
            &self.repo,
            &options.project,
            options.baseline_from.as_deref(),
        )?;

        let plan = match resolved {
            Some(baseline) if options.unlock => RunPlan::Unlock {
                baseline,
                q: options.unlock_q,
                add_k: options.unlock_add_k,
            },
            Some(baseline) => {
                if options.candidates_only || options.use_plan.is_some() {
                    warn!(
                        target: "semaxis::controller",
                        "A baseline exists; candidate and plan options only apply to first runs"
                    );
                }
                RunPlan::Lock { baseline }
            }
            None if options.unlock => {
                return Err(AxisError::configuration(
                    "unlock requires an existing baseline; run once without unlock to create one",
                ))
            }
            None if options.candidates_only => RunPlan::CandidatesOnly,
            None => RunPlan::Commit {
                plan: options.use_plan,
            },
        };

        info!(
            target: "semaxis::controller",
            project = %options.project,
            mode = ?plan.mode(),
            baseline = ?plan.baseline().map(|b| format!("{}:{}", b.project, b.version)),
            "Planned run"
        );
        Ok(plan)
    }

    /// Execute a planned run on the embedding matrix.
    pub fn execute(&self, plan: &RunPlan, x: &DMatrix<f64>, options: &RunOptions) -> AxisResult<RunOutcome> {
        let n = x.nrows();
        let k_max = self.config.analysis.k_max;
        if n < SMALL_SAMPLE_FLOOR.max(3 * k_max) {
            warn!(
                target: "semaxis::controller",
                n = n,
                k_max = k_max,
                "Few input rows; exploration will be coarse"
            );
        }

        match plan {
            RunPlan::CandidatesOnly => self.run_candidates_only(x, options),
            RunPlan::Commit { plan } => self.run_commit(x, *plan, options),
            RunPlan::Lock { baseline } => self.run_lock(x, baseline, options),
            RunPlan::Unlock { baseline, q, add_k } => {
                self.run_unlock(x, baseline, *q, *add_k, options)
            }
        }
    }

    fn base_report(&self, n: usize, mode: RunMode, options: &RunOptions) -> RunReport {
        RunReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            n,
            project: options.project.clone(),
            mode,
            used_version: None,
            base_project: None,
            base_version: None,
            base_source: None,
            plan: None,
            d1: None,
            k: None,
            d2: None,
            candidates_top5: Vec::new(),
            unlock: None,
            rank_method: RANK_METHOD.to_string(),
            metric_family: METRIC_FAMILY.to_string(),
            centroids_are_normalized: true,
            embedding_model: options.embedding_model.clone(),
            device: options.device.clone(),
        }
    }

    fn require_rows(n: usize, minimum: usize) -> AxisResult<()> {
        if n < minimum {
            return Err(AxisError::configuration(format!(
                "at least {} input rows are required, got {}",
                minimum, n
            )));
        }
        Ok(())
    }

    fn run_candidates_only(&self, x: &DMatrix<f64>, options: &RunOptions) -> AxisResult<RunOutcome> {
        Self::require_rows(x.nrows(), MIN_ROWS)?;
        let exploration = self.explorer.explore(x)?;
        let shortlist = self.explorer.rescore_shortlist(&exploration)?;

        let mut report = self.base_report(x.nrows(), RunMode::CandidatesOnly, options);
        report.d1 = Some(shortlist.axis_count);
        report.candidates_top5 = exploration.shortlist();

        info!(
            target: "semaxis::controller",
            candidates = exploration.candidates.len(),
            axis_count = shortlist.axis_count,
            "Candidates-only run finished; no baseline written"
        );
        Ok(RunOutcome {
            report,
            scored: None,
            exploration: Some(exploration),
            shortlist: Some(shortlist),
        })
    }

    fn run_commit(&self, x: &DMatrix<f64>, plan: Option<usize>, options: &RunOptions) -> AxisResult<RunOutcome> {
        Self::require_rows(x.nrows(), MIN_ROWS)?;
        let exploration = self.explorer.explore(x)?;
        let (plan_no, chosen) = exploration
            .plan(plan.unwrap_or(1))
            .map(|(p, c)| (p, c.clone()))
            .ok_or_else(|| AxisError::analysis("no candidates to commit"))?;
        if let Some(requested) = plan {
            if requested != plan_no {
                warn!(
                    target: "semaxis::controller",
                    requested = requested,
                    used = plan_no,
                    "Plan number out of range; clamped"
                );
            }
        }
        info!(
            target: "semaxis::controller",
            plan = plan_no,
            d1 = chosen.d1,
            k = chosen.k,
            "Committing plan"
        );

        let stage1 = exploration.stage1_for(chosen.d1).ok_or_else(|| {
            AxisError::analysis(format!("no stage-1 fit recorded for d1={}", chosen.d1))
        })?;
        let fit = self.explorer.fit_final(stage1, chosen.k)?;
        let centroids = CentroidSet::from_rows(&fit.centroids)?;
        let assignment = assign_nearest(&fit.unit, &centroids.to_rows())?;

        let a = &self.config.analysis;
        let manifest = VersionManifest {
            project: options.project.clone(),
            mode: BaselineMode::First,
            created_at: Utc::now(),
            algorithm_version: ALGORITHM_VERSION.to_string(),
            embedding_model: options.embedding_model.clone(),
            pca_var: a.pca_var,
            seed: a.seed,
            rank_method: RANK_METHOD.to_string(),
            metric_family: METRIC_FAMILY.to_string(),
            centroids_are_normalized: true,
            plan: Some(PlanRecord {
                rank: plan_no,
                d1: stage1.transform.axis_count(),
                k: chosen.k,
                chosen: chosen.clone(),
            }),
            unlock: None,
            extended_from: None,
            environment: EnvironmentInfo::current(options.device.clone()),
        };
        let draft = VersionDraft {
            stage1: stage1.transform.clone(),
            stage2: fit.stage2.clone(),
            centroids,
            manifest,
        };
        let version = self.repo.create_version(&options.project, &draft)?;

        let mut report = self.base_report(x.nrows(), RunMode::Commit, options);
        report.used_version = Some(version);
        report.plan = Some(plan_no);
        report.d1 = Some(stage1.transform.axis_count());
        report.k = Some(chosen.k);
        report.d2 = Some(fit.stage2.axis_count());
        report.candidates_top5 = exploration.shortlist();

        info!(
            target: "semaxis::controller",
            project = %options.project,
            version = %version,
            "Baseline created"
        );
        Ok(RunOutcome {
            report,
            scored: Some(ScoredAssignment {
                coords: matrix_to_rows(&fit.coords),
                assignment,
                novel: None,
            }),
            exploration: Some(exploration),
            shortlist: None,
        })
    }

    /// Load the resolved version and project `x` through its frozen transforms.
    fn project_onto(
        &self,
        x: &DMatrix<f64>,
        resolved: &ResolvedBaseline,
        options: &RunOptions,
    ) -> AxisResult<(BaselineVersion, DMatrix<f64>, Vec<Vec<f64>>)> {
        Self::require_rows(x.nrows(), 1)?;
        let base = self
            .repo
            .load_version(&resolved.project, Some(resolved.version))?;
        if !base.manifest.embedding_model.is_empty()
            && base.manifest.embedding_model != options.embedding_model
        {
            warn!(
                target: "semaxis::controller",
                baseline_model = %base.manifest.embedding_model,
                current_model = %options.embedding_model,
                "Embedding model differs from the baseline; comparisons over time are less strict"
            );
        }
        let xi1 = base.stage1.apply(x)?;
        let xi2 = base.stage2.apply(&xi1)?;
        let unit = l2_normalize_rows(&xi2);
        Ok((base, xi2, unit))
    }

    fn baseline_report(&self, n: usize, mode: RunMode, base: &BaselineVersion, resolved: &ResolvedBaseline, options: &RunOptions) -> RunReport {
        let mut report = self.base_report(n, mode, options);
        report.base_project = Some(base.project.clone());
        report.base_version = Some(base.version);
        report.base_source = Some(resolved.source);
        report.d1 = Some(base.stage1.axis_count());
        report.d2 = Some(base.stage2.axis_count());
        report.metric_family = base.manifest.metric_family.clone();
        report
    }

    fn run_lock(&self, x: &DMatrix<f64>, resolved: &ResolvedBaseline, options: &RunOptions) -> AxisResult<RunOutcome> {
        let (base, xi2, unit) = self.project_onto(x, resolved, options)?;
        let assignment = assign_nearest(&unit, &base.centroids.to_rows())?;

        let mut report = self.baseline_report(x.nrows(), RunMode::Lock, &base, resolved, options);
        report.used_version = Some(base.version);
        report.k = Some(base.centroids.len());
        report.centroids_are_normalized = base.manifest.centroids_are_normalized;

        info!(
            target: "semaxis::controller",
            baseline = %format!("{}:{}", base.project, base.version),
            k = base.centroids.len(),
            "Lock run assigned rows to frozen centroids"
        );
        Ok(RunOutcome {
            report,
            scored: Some(ScoredAssignment {
                coords: matrix_to_rows(&xi2),
                assignment,
                novel: None,
            }),
            exploration: None,
            shortlist: None,
        })
    }

    fn run_unlock(
        &self,
        x: &DMatrix<f64>,
        resolved: &ResolvedBaseline,
        q: f64,
        add_k: usize,
        options: &RunOptions,
    ) -> AxisResult<RunOutcome> {
        let (base, xi2, unit) = self.project_onto(x, resolved, options)?;
        let extension = extend_centroids(&unit, &base.centroids.to_rows(), q, add_k, &self.config.analysis)?;
        let added = &extension.centroids[base.centroids.len()..];
        let centroids = if added.is_empty() {
            base.centroids.clone()
        } else {
            base.centroids.append(&CentroidSet::from_rows(added)?)?
        };
        let assignment = assign_nearest(&unit, &centroids.to_rows())?;

        let mut manifest = base.manifest.clone();
        manifest.project = options.project.clone();
        manifest.mode = BaselineMode::Unlock;
        manifest.created_at = Utc::now();
        manifest.algorithm_version = ALGORITHM_VERSION.to_string();
        manifest.unlock = Some(extension.info.clone());
        manifest.extended_from = Some(format!("{}:{}", base.project, base.version));
        manifest.environment = EnvironmentInfo::current(options.device.clone());

        let draft = VersionDraft {
            stage1: base.stage1.clone(),
            stage2: base.stage2.clone(),
            centroids,
            manifest,
        };
        let version = self.repo.create_version(&options.project, &draft)?;

        let mut report = self.baseline_report(x.nrows(), RunMode::Unlock, &base, resolved, options);
        report.used_version = Some(version);
        report.k = Some(draft.centroids.len());
        report.unlock = Some(extension.info.clone());

        info!(
            target: "semaxis::controller",
            project = %options.project,
            version = %version,
            outliers = extension.info.outlier_count,
            added = extension.info.added_clusters,
            "Unlock run saved extended baseline"
        );
        Ok(RunOutcome {
            report,
            scored: Some(ScoredAssignment {
                coords: matrix_to_rows(&xi2),
                assignment,
                novel: Some(extension.novel),
            }),
            exploration: None,
            shortlist: None,
        })
    }
}
