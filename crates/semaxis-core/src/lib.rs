//! Semaxis Core Library
//!
//! Turns text embeddings into a small set of independent semantic axes and a
//! cluster assignment that stays comparable across runs.
//!
//! # Architecture
//!
//! This crate defines:
//! - Axis transforms (`Stage1Transform`, `Stage2Transform`) and their retry policy
//! - Cluster quality metrics and the candidate explorer/ranker
//! - Baseline domain types and the `BaselineRepository` trait
//! - The run controller (first run, lock, unlock)
//! - Error types, configuration, input column resolution and the embedding contract
//!
//! # Example
//!
//! ```
//! use semaxis_core::synthetic::{generate_topic_embeddings, TopicEmbeddingSpec};
//!
//! let data = generate_topic_embeddings(&TopicEmbeddingSpec::new(3, 10, 16, 7));
//! assert_eq!(data.len(), 30);
//! ```

pub mod axes;
pub mod baseline;
pub mod clustering;
pub mod columns;
pub mod config;
pub mod controller;
pub mod embedding;
pub mod error;
pub mod explorer;
pub mod linalg;
pub mod metrics;
pub mod synthetic;
// Fixtures are test-only: enable the `test-utils` feature to use them from other crates.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod text;

// Re-exports for convenience
pub use axes::{Stage1Transform, Stage2Transform};
pub use baseline::{BaselineRepository, BaselineVersion, InMemoryBaselineRepository, VersionId};
pub use config::Config;
pub use controller::{RunController, RunMode, RunOptions, RunOutcome, RunPlan, RunReport};
pub use embedding::{EmbeddingBatch, EmbeddingProvider, PrecomputedEmbeddings};
pub use error::{AxisError, AxisResult};
pub use metrics::ClusterScores;
