//! First-stage axis-count proposals.

use std::collections::BTreeSet;

use crate::axes::VarianceModel;

/// Explained-variance thresholds that each propose one axis count.
pub const VARIANCE_THRESHOLDS: [f64; 4] = [0.80, 0.85, 0.90, 0.95];
/// Fixed probes added when the data has enough components.
pub const PROBE_AXIS_COUNTS: [usize; 3] = [16, 24, 32];
/// Accepted band is `[MIN_PROPOSED_AXES, min(MAX_PROPOSED_AXES, available)]`.
pub const MIN_PROPOSED_AXES: usize = 8;
pub const MAX_PROPOSED_AXES: usize = 64;
/// At most this many proposals survive down-sampling.
pub const MAX_PROPOSALS: usize = 5;

/// Propose up to five first-stage axis counts, ascending.
///
/// When the band filter leaves nothing (fewer than 8 components available),
/// the single fallback proposal is the available component count.
pub fn propose_axis_counts(model: &VarianceModel) -> Vec<usize> {
    let available = model.max_components();
    let mut dims = BTreeSet::new();

    for t in VARIANCE_THRESHOLDS {
        let d = model.raw_components_for_variance(t);
        if (2..=available).contains(&d) {
            dims.insert(d);
        }
    }
    for probe in PROBE_AXIS_COUNTS {
        if probe <= available {
            dims.insert(probe);
        }
    }

    let upper = MAX_PROPOSED_AXES.min(available);
    let dims: Vec<usize> = dims
        .into_iter()
        .filter(|d| (MIN_PROPOSED_AXES..=upper).contains(d))
        .collect();

    if dims.is_empty() {
        return vec![available.max(2)];
    }
    downsample_evenly(&dims, MAX_PROPOSALS)
}

/// Pick `target` items at positions `round_half_even(linspace(0, len − 1, target))`.
pub(crate) fn downsample_evenly(values: &[usize], target: usize) -> Vec<usize> {
    if values.len() <= target || target == 0 {
        return values.to_vec();
    }
    let last = (values.len() - 1) as f64;
    let steps = (target - 1).max(1) as f64;
    (0..target)
        .map(|i| {
            let pos = (i as f64 * last / steps).round_ties_even() as usize;
            values[pos.min(values.len() - 1)]
        })
        .collect()
}
