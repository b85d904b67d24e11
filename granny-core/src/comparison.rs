//! Day-over-day temperature comparison and the baseline update policy.

use crate::model::TemperatureComparison;

/// Compare today's reading with the stored baseline.
///
/// Returns `None` on the first run, when no baseline has been stored yet.
pub fn compare(today: f64, stored_yesterday: Option<f64>) -> Option<TemperatureComparison> {
    let yesterday = stored_yesterday?;
    Some(TemperatureComparison { today, yesterday, delta: today - yesterday })
}

/// Decide whether today's reading should replace the stored baseline.
///
/// Changes smaller than `threshold_delta` leave the baseline untouched, so the
/// stored value can lag behind across several small-delta days. A missing
/// comparison always persists to bootstrap the baseline.
pub fn should_persist(comparison: Option<&TemperatureComparison>, threshold_delta: u32) -> bool {
    match comparison {
        None => true,
        Some(c) => c.delta.abs() >= f64::from(threshold_delta),
    }
}
