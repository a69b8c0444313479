// src/client/autosave.rs

use std::time::Duration;

/// Minimum spacing of debounced saves.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(5);

/// Consecutive failed saves before the channel reports itself degraded.
pub const DEFAULT_DEGRADED_AFTER: u32 = 3;

/// Bookkeeping for the client side of the autosave channel.
///
/// Time is fed in by the caller, so the channel never reads a clock.
#[derive(Debug, Clone)]
pub struct AutosaveChannel {
    debounce: Duration,
    degraded_after: u32,
    since_save: Duration,
    dirty: bool,
    failures: u32,
}

impl Default for AutosaveChannel {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE, DEFAULT_DEGRADED_AFTER)
    }
}

impl AutosaveChannel {
    pub fn new(debounce: Duration, degraded_after: u32) -> Self {
        AutosaveChannel {
            debounce,
            degraded_after: degraded_after.max(1),
            since_save: Duration::ZERO,
            dirty: false,
            failures: 0,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn advance(&mut self, elapsed: Duration) {
        self.since_save = self.since_save.saturating_add(elapsed);
    }

    /// Whether a debounced trigger (navigation, timer tick) should save now.
    pub fn debounce_elapsed(&self) -> bool {
        self.dirty && self.since_save >= self.debounce
    }

    pub fn record_success(&mut self) {
        self.dirty = false;
        self.since_save = Duration::ZERO;
        self.failures = 0;
    }

    /// The channel stays dirty; the next trigger retries.
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    pub fn is_degraded(&self) -> bool {
        self.failures >= self.degraded_after
    }
}
