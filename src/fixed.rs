use crate::error::ThrottleError;
use crate::snapshot::UsageSnapshot;
use crate::throttler::Throttle;
use crate::window::WindowKind;

/// Admits every call. Installed in place of the real engines when throttling
/// is administratively disabled (e.g. local development).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAdmit;

impl Throttle for AlwaysAdmit {
    fn proceed_with_cost(&self, _identifier: &str, _cost: f64) -> Result<(), ThrottleError> {
        Ok(())
    }

    fn get_stats(&self, _identifier: &str, kind: WindowKind) -> Option<UsageSnapshot> {
        // Synthetic full one-unit bucket: next admission is immediate.
        Some(UsageSnapshot::new(1.0, 1.0, 0, kind.period_seconds()))
    }
}

/// Rejects every call. Used for maintenance or lockdown windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReject;

impl Throttle for AlwaysReject {
    fn proceed_with_cost(&self, _identifier: &str, _cost: f64) -> Result<(), ThrottleError> {
        Err(ThrottleError::RateExceeded {
            capacity: 0.0,
            period_seconds: 0.0,
            unit: "units".to_string(),
            wait_millis: u64::MAX,
        })
    }

    fn get_stats(&self, _identifier: &str, kind: WindowKind) -> Option<UsageSnapshot> {
        // Synthetic empty one-unit bucket over the queried period.
        Some(UsageSnapshot::new(1.0, 0.0, 0, kind.period_seconds()))
    }
}
