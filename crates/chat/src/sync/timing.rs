//! Polling cadence helpers
//!
//! Pure functions that can be tested without threads.

use std::time::Duration;

/// Delay until the next tick of a fixed-period loop.
///
/// A pass that finished within the period waits out the remainder. A pass
/// that overran skips the ticks it missed and waits for the next period
/// boundary, so passes never overlap and never run back to back.
///
/// # Arguments
/// * `elapsed` - How long the pass that just finished took
/// * `period` - The loop's fixed period (must be non-zero)
pub fn next_tick_delay(elapsed: Duration, period: Duration) -> Duration {
    if period.is_zero() {
        return Duration::ZERO;
    }
    let period_nanos = period.as_nanos();
    let into_period = elapsed.as_nanos() % period_nanos;
    let remaining = period_nanos - into_period;
    Duration::from_nanos(remaining as u64)
}

/// Number of ticks a pass of length `elapsed` skipped
pub fn missed_ticks(elapsed: Duration, period: Duration) -> u64 {
    if period.is_zero() {
        return 0;
    }
    (elapsed.as_nanos() / period.as_nanos()) as u64
}
