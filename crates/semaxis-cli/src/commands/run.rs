//! The run command: input → embeddings → controller → exports.
//!
//! Mode selection happens before embeddings are loaded, so configuration
//! mistakes (unlock without a baseline, a missing external baseline, a bad
//! quantile) fail fast without touching the result directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use semaxis_core::columns::{resolve_columns, ColumnHints};
use semaxis_core::controller::{RunController, RunOptions};
use semaxis_core::embedding::{EmbeddingProvider, PrecomputedEmbeddings};
use semaxis_core::text::sanitize_project_name;
use semaxis_core::Config;
use semaxis_storage::FsBaselineRepository;

use crate::error::CliError;
use crate::export::export_run;
use crate::input::{detect_embeddings, detect_input, load_table};

/// Arguments of a run.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Input CSV (default: input.csv, else the newest *.csv in the working directory)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Precomputed embeddings, row-aligned with the input (default: <stem>_embeddings.{json,csv})
    #[arg(long)]
    pub embeddings: Option<PathBuf>,

    /// Text column name
    #[arg(long)]
    pub text_col: Option<String>,

    /// Id column name
    #[arg(long)]
    pub id_col: Option<String>,

    /// Project name (default: input file stem)
    #[arg(long)]
    pub project: Option<String>,

    /// Configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Embedding model id recorded in provenance
    #[arg(long)]
    pub embedding_model: Option<String>,

    /// Embedding batch size
    #[arg(long = "batch")]
    pub batch_size: Option<usize>,

    /// Maximum token length per text
    #[arg(long)]
    pub max_len: Option<usize>,

    /// Explained-variance target for the linear reduction
    #[arg(long)]
    pub pca_var: Option<f64>,

    /// Smallest cluster count explored
    #[arg(long)]
    pub k_min: Option<usize>,

    /// Largest cluster count explored
    #[arg(long)]
    pub k_max: Option<usize>,

    /// Seed for every randomized step
    #[arg(long)]
    pub seed: Option<u64>,

    /// Extend the baseline with novel clusters instead of locking to it
    #[arg(long)]
    pub unlock: bool,

    /// First run: explore and shortlist candidates without creating a baseline
    #[arg(long)]
    pub show_candidates: bool,

    /// First run: commit plan number N (1 = best)
    #[arg(long)]
    pub use_plan: Option<usize>,

    /// Reuse the baseline of another project
    #[arg(long)]
    pub baseline_from: Option<String>,

    /// Unlock novelty quantile in (0, 1)
    #[arg(long)]
    pub unlock_q: Option<f64>,

    /// Maximum number of clusters added by an unlock run
    #[arg(long)]
    pub unlock_add_k: Option<usize>,

    /// Cap on IC columns written to scores.csv
    #[arg(long)]
    pub max_ic_cols: Option<usize>,
}

impl RunArgs {
    /// Configuration from `--config` or the layered defaults, with flag overrides applied.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::load()?,
        };
        let a = &mut config.analysis;
        if let Some(v) = self.pca_var {
            a.pca_var = v;
        }
        if let Some(v) = self.k_min {
            a.k_min = v;
        }
        if let Some(v) = self.k_max {
            a.k_max = v;
        }
        if let Some(v) = self.seed {
            a.seed = v;
        }
        if let Some(v) = &self.embedding_model {
            config.embedding.model = v.clone();
        }
        if let Some(v) = self.batch_size {
            config.embedding.batch_size = v;
        }
        if let Some(v) = self.max_len {
            config.embedding.max_len = v;
        }
        if let Some(v) = self.unlock_q {
            config.unlock.q = v;
        }
        if let Some(v) = self.unlock_add_k {
            config.unlock.add_k = v;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Execute a run; returns the run directory.
pub fn handle_run(args: &RunArgs, config: Config, working_dir: &Path) -> Result<PathBuf> {
    let input = match &args.input {
        Some(p) => p.clone(),
        None => detect_input(working_dir)?
            .ok_or_else(|| CliError::NoInput(working_dir.display().to_string()))?,
    };
    let project = args
        .project
        .as_deref()
        .map(sanitize_project_name)
        .unwrap_or_else(|| {
            sanitize_project_name(input.file_stem().and_then(|s| s.to_str()).unwrap_or(""))
        });

    let table = load_table(&input)?;
    if table.is_empty() {
        return Err(CliError::EmptyInput(input.display().to_string()).into());
    }
    let selection = resolve_columns(
        &table,
        &ColumnHints {
            text_col: args.text_col.as_deref(),
            id_col: args.id_col.as_deref(),
        },
    )?;
    let records = table.records(&selection);

    let result_root = working_dir.join(&config.storage.result_root);
    let repo = FsBaselineRepository::open(&result_root)?;
    let controller = RunController::new(repo, config);
    let config = controller.config();

    let mut options = RunOptions::new(project.clone(), config);
    options.unlock = args.unlock;
    options.candidates_only = args.show_candidates;
    options.use_plan = args.use_plan;
    options.baseline_from = args.baseline_from.as_deref().map(sanitize_project_name);
    let plan = controller.plan_run(&options).context("planning run")?;

    let embeddings_path = match &args.embeddings {
        Some(p) => p.clone(),
        None => detect_embeddings(&input).ok_or_else(|| CliError::NoEmbeddings(input.display().to_string()))?,
    };
    let provider = PrecomputedEmbeddings::from_path(config.embedding.model.clone(), &embeddings_path)?;
    let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
    let batch = provider.embed(&texts, config.embedding.batch_size, config.embedding.max_len)?;
    if batch.truncated > 0 {
        warn!(
            target: "semaxis::embedding",
            truncated = batch.truncated,
            max_len = config.embedding.max_len,
            "Texts longer than the maximum length were truncated"
        );
    }
    options.embedding_model = provider.model_id().to_string();
    options.device = batch.device.clone();

    info!(
        target: "semaxis::cli",
        project = %project,
        rows = records.len(),
        dim = batch.matrix.ncols(),
        mode = ?plan.mode(),
        "Starting run"
    );
    let outcome = controller.execute(&plan, &batch.matrix, &options)?;
    export_run(&result_root, &records, &outcome, args.max_ic_cols)
}
