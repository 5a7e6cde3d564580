use serde::Serialize;

/// Read-only view of one window's current allowance and limits, produced by
/// `get_stats`. Pure value; holds no mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageSnapshot {
    capacity_for_window: f64,
    remaining: f64,
    min_interval_millis: u64,
    period_seconds: f64,
}

impl UsageSnapshot {
    pub fn new(
        capacity_for_window: f64,
        remaining: f64,
        min_interval_millis: u64,
        period_seconds: f64,
    ) -> Self {
        Self {
            capacity_for_window,
            remaining,
            min_interval_millis,
            period_seconds,
        }
    }

    pub fn capacity_for_window(&self) -> f64 {
        self.capacity_for_window
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    pub fn min_interval_millis(&self) -> u64 {
        self.min_interval_millis
    }

    pub fn period_seconds(&self) -> f64 {
        self.period_seconds
    }

    /// How long a caller should wait before a one-unit call can be admitted
    /// by this window. With at least one unit remaining only the minimum
    /// interval applies; otherwise the linear recovery time for the missing
    /// fraction, rounded up with a one-millisecond safety margin.
    pub fn millis_until_next_admission(&self) -> u64 {
        if self.remaining >= 1.0 {
            return self.min_interval_millis;
        }
        let millis_per_unit = self.period_seconds / self.capacity_for_window * 1_000.0;
        let recovery = ((1.0 - self.remaining) * millis_per_unit).ceil() as u64 + 1;
        recovery.max(self.min_interval_millis)
    }
}
