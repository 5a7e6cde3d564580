use crate::error::ThrottleError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Closed set of supported rolling windows. Allowance is tracked
/// independently for every kind configured on a throttler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// Short burst window (15 seconds).
    Burst,
    Hour,
    Day,
}

impl WindowKind {
    pub fn period(&self) -> Duration {
        match self {
            WindowKind::Burst => Duration::from_secs(15),
            WindowKind::Hour => Duration::from_secs(3_600),
            WindowKind::Day => Duration::from_secs(86_400),
        }
    }

    pub fn period_seconds(&self) -> f64 {
        self.period().as_secs_f64()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Burst => "burst",
            WindowKind::Hour => "hour",
            WindowKind::Day => "day",
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable (kind, capacity, unit label) triple. The period is fixed by the
/// window kind; capacity is the budget recoverable over one full period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowDefinition {
    kind: WindowKind,
    capacity: f64,
    period_seconds: f64,
    unit_label: String,
}

impl WindowDefinition {
    pub fn new(kind: WindowKind, capacity: f64, unit_label: &str) -> Result<Self, ThrottleError> {
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(ThrottleError::Configuration(format!(
                "window capacity must be a positive number, got {} for {} window",
                capacity, kind
            )));
        }
        let period_seconds = kind.period_seconds();
        if period_seconds <= 0.0 {
            return Err(ThrottleError::Configuration(format!(
                "window period must be positive, got {}s for {} window",
                period_seconds, kind
            )));
        }
        Ok(Self {
            kind,
            capacity,
            period_seconds,
            unit_label: unit_label.to_string(),
        })
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn period_seconds(&self) -> f64 {
        self.period_seconds
    }

    pub fn unit_label(&self) -> &str {
        &self.unit_label
    }

    /// Units recovered per second.
    pub fn recovery_rate(&self) -> f64 {
        self.capacity / self.period_seconds
    }
}

/// Named, write-once collection of window definitions, one per kind.
/// Built at configuration time and handed to a throttler; a set with zero
/// windows admits everything.
#[derive(Debug, Clone, Default)]
pub struct WindowDefinitionSet {
    label: String,
    unit_label: String,
    definitions: BTreeMap<WindowKind, WindowDefinition>,
}

impl WindowDefinitionSet {
    pub fn new(label: &str, unit_label: &str) -> Self {
        Self {
            label: label.to_string(),
            unit_label: unit_label.to_string(),
            definitions: BTreeMap::new(),
        }
    }

    /// Registers a window. Adding the same kind twice overwrites the prior
    /// entry (last write wins).
    pub fn add_definition(&mut self, kind: WindowKind, capacity: f64) -> Result<(), ThrottleError> {
        let definition = WindowDefinition::new(kind, capacity, &self.unit_label)?;
        self.definitions.insert(kind, definition);
        Ok(())
    }

    pub fn definition_for(&self, kind: WindowKind) -> Option<&WindowDefinition> {
        self.definitions.get(&kind)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &WindowDefinition> {
        self.definitions.values()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn unit_label(&self) -> &str {
        &self.unit_label
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
