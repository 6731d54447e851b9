// Cumulative long queuing delay over main-thread tasks

use crate::error::{AnalysisError, Result};
use crate::model::Interval;

/// Tasks at least this long can delay an input event past the threshold.
pub const LONG_QUEUING_DELAY_THRESHOLD_MS: f64 = 50.0;

/// Sum of the long-queuing-delay regions of `intervals` that fall inside
/// `[lower_bound_ms, upper_bound_ms]`.
///
/// ```text
/// [              250ms task                   ]
/// |  long queuing delay region  |  threshold  |
/// ```
///
/// Only the part of a task before its final `threshold_ms` can make an
/// arriving input wait longer than `threshold_ms`.
pub fn cumulative_long_queuing_delay(
    intervals: &[Interval],
    lower_bound_ms: f64,
    upper_bound_ms: f64,
    threshold_ms: f64,
) -> f64 {
    intervals
        .iter()
        .filter(|task| task.duration >= threshold_ms)
        .map(|task| (task.start, task.end - threshold_ms))
        .filter(|&(start, end)| end >= lower_bound_ms && start <= upper_bound_ms)
        .map(|(start, end)| {
            let clipped_start = start.max(lower_bound_ms);
            let clipped_end = end.min(upper_bound_ms);
            (clipped_end - clipped_start).max(0.0)
        })
        .sum()
}

/// Observed variant: real trace tasks between first contentful paint and
/// interactive time. Both bounds come from collaborators; FCP is mandatory.
pub fn observed_delay(
    intervals: &[Interval],
    first_contentful_paint_ms: Option<f64>,
    interactive_ms: Option<f64>,
    threshold_ms: f64,
) -> Result<f64> {
    let fcp = first_contentful_paint_ms
        .ok_or(AnalysisError::MissingSignal("first-contentful-paint"))?;
    let interactive = interactive_ms.ok_or(AnalysisError::MissingSignal("interactive"))?;

    Ok(cumulative_long_queuing_delay(
        intervals,
        fcp,
        interactive,
        threshold_ms,
    ))
}
