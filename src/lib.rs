//! Multi-window token-bucket admission control.
//!
//! Per caller identifier, the engine decides whether a unit-costed operation
//! (an API request, or a payload measured in megabytes) may proceed right
//! now, given independently configured allowances over several rolling time
//! windows (15-second burst, hourly, daily). All state is in memory and
//! process-scoped; this is not a distributed rate limiter.
//!
//! ```
//! use rategate::{RequestThrottler, Throttle, WindowDefinitionSet, WindowKind};
//!
//! let mut windows = WindowDefinitionSet::new("api", "requests");
//! windows.add_definition(WindowKind::Burst, 75.0).unwrap();
//! windows.add_definition(WindowKind::Hour, 3000.0).unwrap();
//!
//! let throttler = RequestThrottler::request("api", windows, 100);
//! assert!(throttler.proceed("user-42").is_ok());
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod fixed;
pub mod registry;
pub mod snapshot;
pub mod throttler;
pub mod tracker;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{build_throttler, Settings, ThrottlerMode, ThrottlerRule};
pub use error::{Result, ThrottleError};
pub use fixed::{AlwaysAdmit, AlwaysReject};
pub use registry::AllowanceTrackerRegistry;
pub use snapshot::UsageSnapshot;
pub use throttler::{
    AdmissionPolicy, RequestPolicy, RequestThrottler, Throttle, TokenBucketThrottler,
    UploadPolicy, UploadThrottler, FULL_BUCKET_TOLERANCE,
};
pub use tracker::AllowanceTracker;
pub use window::{WindowDefinition, WindowDefinitionSet, WindowKind};
