use std::time::Duration;

/// Timer display refresh interval in milliseconds. Elapsed time is
/// re-derived from the start timestamp on every tick, never accumulated.
pub const TIMER_TICK_MS: u64 = 1000;

/// Change-feed poll interval for `sync watch`, in milliseconds
pub const FEED_POLL_MS: u64 = 2000;

/// Get the timer tick duration
pub fn tick_duration() -> Duration {
    Duration::from_millis(TIMER_TICK_MS)
}

/// Get the change-feed poll duration
pub fn feed_poll_duration() -> Duration {
    Duration::from_millis(FEED_POLL_MS)
}
