use std::time::{Duration, Instant};

/// Logs one pipeline stage against the run's start and returns the new total,
/// to be passed back as `previous` for the next stage.
pub(crate) fn trace(stage: &str, step: &str, start: Instant, previous: Duration) -> Duration {
    let total = start.elapsed();
    log::trace!("{} | Total={:.2?} | {}={:.2?}", stage, total, step, total.saturating_sub(previous));
    total
}
