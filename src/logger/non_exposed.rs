use crate::domain::{Event, NON_EXPOSED_CHECKS_EVENT};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Counts of checks that produced no exposure event, reported in aggregate.
#[derive(Debug, Default)]
pub struct NonExposedChecks {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl NonExposedChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, name: &str) {
        *self.counts.lock().entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counts.lock().get(name).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.lock().is_empty()
    }

    /// Drain the counters into a single summary event.
    pub fn take_summary_event(&self) -> Option<Event> {
        let counts = std::mem::take(&mut *self.counts.lock());
        if counts.is_empty() {
            return None;
        }

        let checks: Map<String, Value> = counts
            .into_iter()
            .map(|(name, count)| (name, Value::from(count)))
            .collect();

        Some(Event::new(NON_EXPOSED_CHECKS_EVENT).with_metadata("checks", Value::Object(checks)))
    }
}
