use crate::window::{WindowDefinitionSet, WindowKind};
use std::collections::HashMap;

/// Mutable per-identifier allowance state. Created lazily with every bucket
/// full, then mutated exclusively by the admission algorithm while the
/// owning registry entry's lock is held.
#[derive(Debug)]
pub struct AllowanceTracker {
    identifier: String,
    allowance: HashMap<WindowKind, f64>,
    pub(crate) last_check: u64,
    pub(crate) first_call: bool,
}

impl AllowanceTracker {
    pub(crate) fn new(identifier: &str, windows: &WindowDefinitionSet, now_millis: u64) -> Self {
        let allowance = windows
            .definitions()
            .map(|def| (def.kind(), def.capacity()))
            .collect();
        Self {
            identifier: identifier.to_string(),
            allowance,
            last_check: now_millis,
            first_call: true,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn allowance(&self, kind: WindowKind) -> f64 {
        self.allowance.get(&kind).copied().unwrap_or_default()
    }

    pub(crate) fn allowance_mut(&mut self, kind: WindowKind) -> &mut f64 {
        self.allowance.entry(kind).or_default()
    }

    pub fn is_first_call(&self) -> bool {
        self.first_call
    }

    pub fn last_check_millis(&self) -> u64 {
        self.last_check
    }
}
