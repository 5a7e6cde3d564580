use crate::clock::{Clock, SystemClock};
use crate::error::ThrottleError;
use crate::registry::AllowanceTrackerRegistry;
use crate::snapshot::UsageSnapshot;
use crate::tracker::AllowanceTracker;
use crate::window::{WindowDefinitionSet, WindowKind};
use std::sync::Arc;
use tracing::{debug, warn};

/// Relative slack under which a window's allowance counts as a full bucket
/// for the oversized-single-item exception. Tunable; there is no principled
/// value, it only needs to absorb accumulated floating-point error.
pub const FULL_BUCKET_TOLERANCE: f64 = 1e-9;

/// The two operations a request pipeline calls before doing real work, plus
/// the reporting hook. Implemented by the token-bucket engine and by the
/// fixed always-admit / always-reject policies.
pub trait Throttle: Send + Sync {
    /// Admission check at the default cost of one unit.
    fn proceed(&self, identifier: &str) -> Result<(), ThrottleError> {
        self.proceed_with_cost(identifier, 1.0)
    }

    /// Admission check at an explicit cost (e.g. payload megabytes).
    fn proceed_with_cost(&self, identifier: &str, cost: f64) -> Result<(), ThrottleError>;

    /// Read-only usage report for one window. Never applies recovery and
    /// never consumes allowance. `None` when the kind is not configured.
    fn get_stats(&self, identifier: &str, kind: WindowKind) -> Option<UsageSnapshot>;
}

/// Variant-specific behavior plugged into the shared engine: the hard
/// minimum spacing gate and the oversized-single-item exception.
pub trait AdmissionPolicy: Send + Sync {
    /// Absolute minimum spacing between calls, evaluated before any window
    /// arithmetic. Zero disables the gate.
    fn min_interval_millis(&self) -> u64 {
        0
    }

    /// Whether a window whose remaining allowance is `allowance` out of
    /// `capacity` admits a cost larger than that allowance.
    fn grants_oversized(&self, allowance: f64, capacity: f64) -> bool {
        let _ = (allowance, capacity);
        false
    }
}

/// Request-style policy: unit cost, plus a hard floor on call spacing that
/// token-bucket averaging alone cannot express.
#[derive(Debug, Clone, Copy)]
pub struct RequestPolicy {
    min_interval_millis: u64,
}

impl RequestPolicy {
    pub fn new(min_interval_millis: u64) -> Self {
        Self {
            min_interval_millis,
        }
    }
}

impl AdmissionPolicy for RequestPolicy {
    fn min_interval_millis(&self) -> u64 {
        self.min_interval_millis
    }
}

/// Upload-style policy: caller-supplied payload cost. A window sitting at
/// full capacity admits a single item of any size, so an item larger than
/// the per-period allowance can still be transferred once the bucket has
/// fully recovered.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadPolicy;

impl AdmissionPolicy for UploadPolicy {
    fn grants_oversized(&self, allowance: f64, capacity: f64) -> bool {
        capacity - allowance <= FULL_BUCKET_TOLERANCE * capacity
    }
}

/// Multi-window token-bucket engine. Each identifier owns an
/// `AllowanceTracker` whose windows recover linearly toward capacity and are
/// drained by admitted calls; every configured window must agree before a
/// call is admitted. Decisions for one identifier are serialized by the
/// tracker's own mutex; different identifiers proceed in parallel.
pub struct TokenBucketThrottler<P: AdmissionPolicy> {
    label: String,
    windows: WindowDefinitionSet,
    registry: AllowanceTrackerRegistry,
    clock: Arc<dyn Clock>,
    policy: P,
}

/// Request variant: unit cost, minimum inter-call interval.
pub type RequestThrottler = TokenBucketThrottler<RequestPolicy>;

/// Upload variant: payload-sized cost, oversized-single-item exception.
pub type UploadThrottler = TokenBucketThrottler<UploadPolicy>;

impl TokenBucketThrottler<RequestPolicy> {
    pub fn request(label: &str, windows: WindowDefinitionSet, min_interval_millis: u64) -> Self {
        Self::with_policy(label, windows, RequestPolicy::new(min_interval_millis))
    }
}

impl TokenBucketThrottler<UploadPolicy> {
    pub fn upload(label: &str, windows: WindowDefinitionSet) -> Self {
        Self::with_policy(label, windows, UploadPolicy)
    }
}

impl<P: AdmissionPolicy> TokenBucketThrottler<P> {
    pub fn with_policy(label: &str, windows: WindowDefinitionSet, policy: P) -> Self {
        Self {
            label: label.to_string(),
            windows,
            registry: AllowanceTrackerRegistry::new(),
            clock: Arc::new(SystemClock),
            policy,
        }
    }

    /// Replaces the wall clock, for deterministic tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of identifiers seen so far.
    pub fn tracked_identifiers(&self) -> usize {
        self.registry.len()
    }

    fn admit(&self, identifier: &str, cost: f64) -> Result<(), ThrottleError> {
        if self.windows.is_empty() {
            return Ok(());
        }

        let tracker = self.registry.tracker_for(identifier, || {
            AllowanceTracker::new(identifier, &self.windows, self.clock.now_millis())
        });
        let mut tracker = tracker.lock();

        let now = self.clock.now_millis();
        let elapsed = now.saturating_sub(tracker.last_check);

        if !tracker.first_call {
            let min_interval = self.policy.min_interval_millis();
            if min_interval > 0 && elapsed < min_interval {
                warn!(
                    target: "rategate::throttler",
                    throttler = %self.label,
                    identifier,
                    min_interval_millis = min_interval,
                    observed_millis = elapsed,
                    "call rejected, minimum interval violated"
                );
                return Err(ThrottleError::TooFrequent {
                    min_interval_millis: min_interval,
                    observed_millis: elapsed,
                });
            }

            // Recovery commits whether or not the call is admitted; only the
            // decrement below is conditional on success.
            let elapsed_secs = elapsed as f64 / 1_000.0;
            for def in self.windows.definitions() {
                let recovered = elapsed_secs * def.recovery_rate();
                let allowance = tracker.allowance_mut(def.kind());
                *allowance = (*allowance + recovered).min(def.capacity());
            }
        }

        for def in self.windows.definitions() {
            let allowance = tracker.allowance(def.kind());
            if allowance - cost < 0.0 && !self.policy.grants_oversized(allowance, def.capacity()) {
                let snapshot = UsageSnapshot::new(
                    def.capacity(),
                    allowance,
                    self.policy.min_interval_millis(),
                    def.period_seconds(),
                );
                let wait_millis = snapshot.millis_until_next_admission();
                warn!(
                    target: "rategate::throttler",
                    throttler = %self.label,
                    identifier,
                    window = %def.kind(),
                    cost,
                    allowance,
                    wait_millis,
                    "call rejected, window allowance exhausted"
                );
                return Err(ThrottleError::RateExceeded {
                    capacity: def.capacity(),
                    period_seconds: def.period_seconds(),
                    unit: def.unit_label().to_string(),
                    wait_millis,
                });
            }
        }

        // The oversized exception can push an allowance below zero; clamp so
        // the tracker never finishes a decision in a negative state.
        for def in self.windows.definitions() {
            let allowance = tracker.allowance_mut(def.kind());
            *allowance = (*allowance - cost).max(0.0);
        }
        tracker.last_check = now;
        tracker.first_call = false;

        debug!(
            target: "rategate::throttler",
            throttler = %self.label,
            identifier,
            cost,
            "call admitted"
        );
        Ok(())
    }
}

impl<P: AdmissionPolicy> Throttle for TokenBucketThrottler<P> {
    fn proceed_with_cost(&self, identifier: &str, cost: f64) -> Result<(), ThrottleError> {
        self.admit(identifier, cost)
    }

    fn get_stats(&self, identifier: &str, kind: WindowKind) -> Option<UsageSnapshot> {
        let def = self.windows.definition_for(kind)?;
        let remaining = match self.registry.peek(identifier) {
            Some(tracker) => tracker.lock().allowance(kind),
            // An unseen identifier has a full bucket; reporting must not
            // create a tracker.
            None => def.capacity(),
        };
        Some(UsageSnapshot::new(
            def.capacity(),
            remaining,
            self.policy.min_interval_millis(),
            def.period_seconds(),
        ))
    }
}
