//! Configuration management for semaxis.

mod sub_configs;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::error::{AxisError, AxisResult};

pub use sub_configs::{AnalysisConfig, EmbeddingConfig, LoggingConfig, StorageConfig, UnlockConfig};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub analysis: AnalysisConfig,
    pub embedding: EmbeddingConfig,
    pub storage: StorageConfig,
    pub unlock: UnlockConfig,
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in order:
    /// 1. config/default.toml (base settings)
    /// 2. config/{SEMAXIS_ENV}.toml (environment-specific)
    /// 3. Environment variables with SEMAXIS__ prefix (e.g. `SEMAXIS__ANALYSIS__K_MAX=8`)
    pub fn load() -> AxisResult<Self> {
        let env = std::env::var("SEMAXIS_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                config::Environment::with_prefix("SEMAXIS")
                    .prefix_separator("__")
                    .separator("__"),
            );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> AxisResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AxisError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| AxisError::Configuration(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> AxisResult<()> {
        let a = &self.analysis;

        if !(a.pca_var > 0.0 && a.pca_var < 1.0) {
            return Err(AxisError::configuration(format!(
                "analysis.pca_var must be in (0, 1), got {}",
                a.pca_var
            )));
        }
        if a.k_min < 2 {
            return Err(AxisError::configuration("analysis.k_min must be >= 2"));
        }
        if a.k_max < a.k_min {
            return Err(AxisError::configuration(format!(
                "analysis.k_max ({}) must be >= analysis.k_min ({})",
                a.k_max, a.k_min
            )));
        }
        if a.ica_max_iter == 0 || a.kmeans_max_iter == 0 {
            return Err(AxisError::configuration(
                "analysis.ica_max_iter and analysis.kmeans_max_iter must be > 0",
            ));
        }
        if a.explore_restarts == 0 || a.final_restarts == 0 {
            return Err(AxisError::configuration(
                "analysis.explore_restarts and analysis.final_restarts must be > 0",
            ));
        }
        if !(a.ica_tol > 0.0 && a.ica_tol.is_finite()) || !(a.kmeans_tol > 0.0 && a.kmeans_tol.is_finite()) {
            return Err(AxisError::configuration(
                "analysis.ica_tol and analysis.kmeans_tol must be finite positive numbers",
            ));
        }

        validate_unlock_quantile(self.unlock.q)?;

        if self.embedding.model.trim().is_empty() {
            return Err(AxisError::configuration("embedding.model must not be empty"));
        }
        if self.embedding.batch_size == 0 {
            return Err(AxisError::configuration(
                "embedding.batch_size must be greater than 0",
            ));
        }
        if self.storage.result_root.trim().is_empty() {
            return Err(AxisError::configuration(
                "storage.result_root must not be empty",
            ));
        }

        Ok(())
    }
}

/// Reject unlock quantiles outside the open interval (0, 1).
pub fn validate_unlock_quantile(q: f64) -> AxisResult<()> {
    if q > 0.0 && q < 1.0 {
        Ok(())
    } else {
        Err(AxisError::configuration(format!(
            "unlock quantile must be in (0, 1), got {} (e.g. 0.90)",
            q
        )))
    }
}
