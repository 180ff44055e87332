//! Axis Transform: the two-stage reduction from embeddings to interpretable coordinates.
//!
//! ```text
//! X (n × d_embed)
//!   └─ standardize ─ variance reduction (n_pcs) ─ rotation 1 (d1)   = Stage1Transform
//!                                                  └─ rotation 2 (d2) = Stage2Transform
//! ```
//!
//! Fits are seeded and retried through [`retry::FitAttemptPolicy`]. Applying a
//! frozen transform is deterministic and never random.

pub mod ica;
pub mod retry;
mod stage1;
mod stage2;
mod variance;

pub use ica::{FitFailure, IcaConfig};
pub use retry::{FitAttempt, FitAttemptPolicy};
pub use stage1::Stage1Transform;
pub use stage2::{stage2_axis_count, Stage2Transform};
pub use variance::{Standardizer, VarianceModel};
