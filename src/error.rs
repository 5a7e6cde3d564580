use thiserror::Error;

pub type Result<T> = std::result::Result<T, ThrottleError>;

/// Structured admission-control errors. `RateExceeded` and `TooFrequent` are
/// returned synchronously from `proceed`; retry and backoff are the caller's
/// responsibility, informed by the carried wait figures. `Configuration` is
/// only produced at startup and is fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThrottleError {
    #[error("rate limit exceeded: {capacity} {unit} per {period_seconds}s, retry in {wait_millis} ms")]
    RateExceeded {
        capacity: f64,
        period_seconds: f64,
        unit: String,
        wait_millis: u64,
    },

    #[error("calls too frequent: minimum interval is {min_interval_millis} ms, observed {observed_millis} ms")]
    TooFrequent {
        min_interval_millis: u64,
        observed_millis: u64,
    },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ThrottleError {
    /// Minimum time the caller should wait before retrying, when the error
    /// carries one.
    pub fn wait_millis(&self) -> Option<u64> {
        match self {
            ThrottleError::RateExceeded { wait_millis, .. } => Some(*wait_millis),
            ThrottleError::TooFrequent {
                min_interval_millis,
                observed_millis,
            } => Some(min_interval_millis.saturating_sub(*observed_millis)),
            ThrottleError::Configuration(_) => None,
        }
    }
}
