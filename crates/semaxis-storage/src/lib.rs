//! Semaxis Storage Layer
//!
//! Persists baselines as plain files so they can be inspected, copied and
//! versioned alongside run outputs.
//!
//! # Architecture
//! - `layout`: directory layout and atomic file helpers
//! - `repository`: [`FsBaselineRepository`], the filesystem `BaselineRepository`
//!
//! # Files per version
//! - `stage1.json`, `stage2.json`: frozen axis transforms
//! - `centroids.f32`: `b"SXC1"` header, row/column counts, little-endian f32 values
//! - `manifest.json`: provenance of the version

pub mod layout;
pub mod repository;

pub use repository::FsBaselineRepository;

// Re-export the trait so callers need only this crate for storage access
pub use semaxis_core::baseline::BaselineRepository;
