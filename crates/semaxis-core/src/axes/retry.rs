//! Bounded retry policy for independent-axis fits.
//!
//! Attempt schedule for a requested count `d` and seed `s`:
//!
//! | # | seed  | count | note                          |
//! |---|-------|-------|-------------------------------|
//! | 1 | s     | d     | primary                       |
//! | 2 | s + 1 | d     | perturbed seed                |
//! | 3 | s + 2 | d − 1 | degraded, only if d − 1 ≥ min |
//!
//! When the schedule is exhausted the failure becomes `AxisError::Analysis`.

use tracing::warn;

use super::ica::FitFailure;
use crate::error::{AxisError, AxisResult};

/// One scheduled fit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitAttempt {
    pub seed: u64,
    pub components: usize,
    /// True when the component count was reduced below the request.
    pub degraded: bool,
}

/// Retry schedule for a fit stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitAttemptPolicy {
    /// Smallest component count a degraded attempt may use.
    pub min_components: usize,
}

impl FitAttemptPolicy {
    /// Stage-1 rotations keep at least two axes.
    pub const STAGE1: Self = Self { min_components: 2 };
    /// Stage-2 rotations may shrink to a single axis.
    pub const STAGE2: Self = Self { min_components: 1 };

    /// Maximum number of attempts the schedule can contain.
    pub const MAX_ATTEMPTS: usize = 3;

    /// The attempt schedule for a request.
    pub fn attempts(&self, requested: usize, seed: u64) -> Vec<FitAttempt> {
        let mut out = Vec::with_capacity(Self::MAX_ATTEMPTS);
        out.push(FitAttempt {
            seed,
            components: requested,
            degraded: false,
        });
        out.push(FitAttempt {
            seed: seed.wrapping_add(1),
            components: requested,
            degraded: false,
        });
        if requested > self.min_components {
            out.push(FitAttempt {
                seed: seed.wrapping_add(2),
                components: requested - 1,
                degraded: true,
            });
        }
        out.truncate(Self::MAX_ATTEMPTS);
        out
    }

    /// Run `fit` over the schedule, returning the first success and the attempt that produced it.
    pub fn run<T, F>(
        &self,
        stage: &str,
        requested: usize,
        seed: u64,
        mut fit: F,
    ) -> AxisResult<(T, FitAttempt)>
    where
        F: FnMut(FitAttempt) -> Result<T, FitFailure>,
    {
        let mut last_failure = None;
        for (i, attempt) in self.attempts(requested, seed).into_iter().enumerate() {
            if i > 0 {
                warn!(
                    target: "semaxis::axes",
                    stage = stage,
                    seed = attempt.seed,
                    components = attempt.components,
                    degraded = attempt.degraded,
                    "Retrying independent-axis fit"
                );
            }
            match fit(attempt) {
                Ok(value) => {
                    if attempt.degraded {
                        warn!(
                            target: "semaxis::axes",
                            stage = stage,
                            requested = requested,
                            used = attempt.components,
                            "Independent-axis fit degraded to fewer components"
                        );
                    }
                    return Ok((value, attempt));
                }
                Err(failure) => {
                    warn!(
                        target: "semaxis::axes",
                        stage = stage,
                        seed = attempt.seed,
                        components = attempt.components,
                        reason = %failure,
                        "Independent-axis fit failed"
                    );
                    last_failure = Some(failure);
                }
            }
        }

        let reason = last_failure
            .map(|f| f.to_string())
            .unwrap_or_else(|| "no attempts scheduled".to_string());
        Err(AxisError::analysis(format!(
            "{} independent-axis fit failed for {} components after all retries: {}",
            stage, requested, reason
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_includes_degraded_attempt() {
        let attempts = FitAttemptPolicy::STAGE1.attempts(5, 42);
        assert_eq!(attempts.len(), 3);
        assert_eq!((attempts[0].seed, attempts[0].components), (42, 5));
        assert_eq!((attempts[1].seed, attempts[1].components), (43, 5));
        assert_eq!((attempts[2].seed, attempts[2].components), (44, 4));
        assert!(attempts[2].degraded);
    }

    #[test]
    fn test_schedule_never_drops_below_minimum() {
        assert_eq!(FitAttemptPolicy::STAGE1.attempts(2, 0).len(), 2);
        assert_eq!(FitAttemptPolicy::STAGE2.attempts(1, 0).len(), 2);
        assert_eq!(FitAttemptPolicy::STAGE2.attempts(2, 0).len(), 3);
    }

    #[test]
    fn test_run_stops_after_max_attempts() {
        let mut calls = 0;
        let result: AxisResult<((), FitAttempt)> = FitAttemptPolicy::STAGE2.run("stage2", 6, 0, |_| {
            calls += 1;
            Err(FitFailure::Degenerate("flat".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(calls, FitAttemptPolicy::MAX_ATTEMPTS);
        for requested in 1..8 {
            assert!(FitAttemptPolicy::STAGE1.attempts(requested, 0).len() <= FitAttemptPolicy::MAX_ATTEMPTS);
        }
    }

    #[test]
    fn test_run_recovers_on_perturbed_seed() {
        let mut calls = Vec::new();
        let (value, attempt) = FitAttemptPolicy::STAGE1
            .run("stage1", 4, 10, |a| {
                calls.push(a.seed);
                if a.seed == 10 {
                    Err(FitFailure::NotConverged {
                        iterations: 5000,
                        lim: 0.1,
                    })
                } else {
                    Ok(a.components * 100)
                }
            })
            .unwrap();

        assert_eq!(value, 400);
        assert_eq!(attempt.seed, 11);
        assert!(!attempt.degraded);
        assert_eq!(calls, vec![10, 11]);
    }

    #[test]
    fn test_run_degrades_then_succeeds() {
        let (_, attempt) = FitAttemptPolicy::STAGE1
            .run("stage1", 4, 0, |a| {
                if a.components == 4 {
                    Err(FitFailure::Degenerate("flat".to_string()))
                } else {
                    Ok(())
                }
            })
            .unwrap();
        assert_eq!(attempt.components, 3);
        assert!(attempt.degraded);
    }

    #[test]
    fn test_run_exhausted_is_analysis_error() {
        let result: AxisResult<((), FitAttempt)> = FitAttemptPolicy::STAGE1.run("stage1", 2, 0, |_| {
            Err(FitFailure::Degenerate("flat".to_string()))
        });
        let err = result.unwrap_err();
        assert!(matches!(err, AxisError::Analysis(_)));
        println!("[VERIFIED] Exhausted retries: {}", err);
    }
}
