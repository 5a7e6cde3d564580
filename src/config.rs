use crate::error::ThrottleError;
use crate::fixed::AlwaysAdmit;
use crate::throttler::{RequestThrottler, Throttle, UploadThrottler};
use crate::window::{WindowDefinitionSet, WindowKind};
use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// Environment-driven settings for the standard throttler instances.
#[derive(Debug, Envconfig, Clone)]
pub struct Settings {
    /// Master switch: when off, every built throttler is `AlwaysAdmit`.
    #[envconfig(from = "THROTTLING_ENABLED", default = "true")]
    pub enabled: bool,

    #[envconfig(from = "USER_REQUEST_BURST_CAPACITY", default = "75")]
    pub user_request_burst_capacity: f64,

    #[envconfig(from = "USER_REQUEST_HOURLY_CAPACITY", default = "3000")]
    pub user_request_hourly_capacity: f64,

    #[envconfig(from = "USER_REQUEST_DAILY_CAPACITY", default = "20000")]
    pub user_request_daily_capacity: f64,

    /// Hard floor on per-user call spacing, in milliseconds.
    #[envconfig(from = "USER_REQUEST_MIN_INTERVAL_MS", default = "100")]
    pub user_request_min_interval_millis: u64,

    #[envconfig(from = "GLOBAL_REQUEST_BURST_CAPACITY", default = "500")]
    pub global_request_burst_capacity: f64,

    #[envconfig(from = "GLOBAL_REQUEST_HOURLY_CAPACITY", default = "50000")]
    pub global_request_hourly_capacity: f64,

    #[envconfig(from = "GLOBAL_REQUEST_DAILY_CAPACITY", default = "500000")]
    pub global_request_daily_capacity: f64,

    #[envconfig(from = "GLOBAL_REQUEST_MIN_INTERVAL_MS", default = "0")]
    pub global_request_min_interval_millis: u64,

    #[envconfig(from = "UPLOAD_BURST_CAPACITY_MB", default = "100")]
    pub upload_burst_capacity_mb: f64,

    #[envconfig(from = "UPLOAD_HOURLY_CAPACITY_MB", default = "1024")]
    pub upload_hourly_capacity_mb: f64,

    #[envconfig(from = "UPLOAD_DAILY_CAPACITY_MB", default = "10240")]
    pub upload_daily_capacity_mb: f64,
}

impl Settings {
    /// Load settings from environment variables.
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Settings::init_from_env()
    }

    /// The three standard instances: per-user requests, global requests,
    /// per-identity uploads.
    pub fn standard_rules(&self) -> Vec<ThrottlerRule> {
        vec![
            ThrottlerRule {
                label: "user-requests".to_string(),
                unit_label: "requests".to_string(),
                mode: ThrottlerMode::Request,
                windows: HashMap::from([
                    (WindowKind::Burst, self.user_request_burst_capacity),
                    (WindowKind::Hour, self.user_request_hourly_capacity),
                    (WindowKind::Day, self.user_request_daily_capacity),
                ]),
                min_interval: Some(Duration::from_millis(
                    self.user_request_min_interval_millis,
                )),
            },
            ThrottlerRule {
                label: "global-requests".to_string(),
                unit_label: "requests".to_string(),
                mode: ThrottlerMode::Request,
                windows: HashMap::from([
                    (WindowKind::Burst, self.global_request_burst_capacity),
                    (WindowKind::Hour, self.global_request_hourly_capacity),
                    (WindowKind::Day, self.global_request_daily_capacity),
                ]),
                min_interval: Some(Duration::from_millis(
                    self.global_request_min_interval_millis,
                )),
            },
            ThrottlerRule {
                label: "uploads".to_string(),
                unit_label: "MB".to_string(),
                mode: ThrottlerMode::Upload,
                windows: HashMap::from([
                    (WindowKind::Burst, self.upload_burst_capacity_mb),
                    (WindowKind::Hour, self.upload_hourly_capacity_mb),
                    (WindowKind::Day, self.upload_daily_capacity_mb),
                ]),
                min_interval: None,
            },
        ]
    }

    /// Build every standard instance, keyed by label.
    pub fn build_all(&self) -> Result<HashMap<String, Box<dyn Throttle>>, ThrottleError> {
        self.standard_rules()
            .iter()
            .map(|rule| {
                build_throttler(rule, self.enabled).map(|t| (rule.label.clone(), t))
            })
            .collect()
    }
}

/// Which engine variant a rule configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottlerMode {
    #[default]
    Request,
    Upload,
}

/// One named throttler instance: its windows, unit, variant and (for request
/// throttlers) the minimum inter-call interval. Deserializable from config
/// files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottlerRule {
    pub label: String,

    #[serde(default = "default_unit_label")]
    pub unit_label: String,

    #[serde(default)]
    pub mode: ThrottlerMode,

    /// (window kind, capacity) pairs.
    pub windows: HashMap<WindowKind, f64>,

    /// Request variant only; ignored for uploads.
    #[serde(default, with = "humantime_serde::option")]
    pub min_interval: Option<Duration>,
}

fn default_unit_label() -> String {
    "requests".to_string()
}

impl ThrottlerRule {
    pub fn validate(&self) -> Result<(), ThrottleError> {
        if self.label.is_empty() {
            return Err(ThrottleError::Configuration(
                "throttler label cannot be empty".to_string(),
            ));
        }
        for (kind, capacity) in &self.windows {
            if !capacity.is_finite() || *capacity <= 0.0 {
                return Err(ThrottleError::Configuration(format!(
                    "throttler '{}': capacity for {} window must be positive, got {}",
                    self.label, kind, capacity
                )));
            }
        }
        Ok(())
    }

    pub fn definition_set(&self) -> Result<WindowDefinitionSet, ThrottleError> {
        let mut set = WindowDefinitionSet::new(&self.label, &self.unit_label);
        for (kind, capacity) in &self.windows {
            set.add_definition(*kind, *capacity)?;
        }
        Ok(set)
    }

    fn min_interval_millis(&self) -> u64 {
        self.min_interval.map(|d| d.as_millis() as u64).unwrap_or(0)
    }
}

/// Turn a rule into a running throttler. With the master switch off every
/// rule builds the always-admit policy instead.
pub fn build_throttler(
    rule: &ThrottlerRule,
    enabled: bool,
) -> Result<Box<dyn Throttle>, ThrottleError> {
    if !enabled {
        info!(
            target: "rategate::config",
            throttler = %rule.label,
            "throttling disabled, installing always-admit policy"
        );
        return Ok(Box::new(AlwaysAdmit));
    }

    rule.validate()?;
    let windows = rule.definition_set()?;
    info!(
        target: "rategate::config",
        throttler = %rule.label,
        mode = ?rule.mode,
        windows = windows.len(),
        "throttler configured"
    );

    match rule.mode {
        ThrottlerMode::Request => Ok(Box::new(RequestThrottler::request(
            &rule.label,
            windows,
            rule.min_interval_millis(),
        ))),
        ThrottlerMode::Upload => Ok(Box::new(UploadThrottler::upload(&rule.label, windows))),
    }
}
