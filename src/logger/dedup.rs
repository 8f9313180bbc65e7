use crate::domain::{Event, user_storage_key};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub const DEDUPE_WINDOW: Duration = Duration::from_secs(600);
pub const MAX_DEDUPE_KEYS: usize = 1000;

const DEDUPE_METADATA_FIELDS: [&str; 7] = [
    "gate",
    "config",
    "ruleID",
    "allocatedExperiment",
    "parameterName",
    "isExplicitParameter",
    "reason",
];

/// Identity of an exposure for deduplication purposes.
pub fn exposure_dedupe_key(sdk_key: &str, event: &Event) -> String {
    let mut parts = Vec::with_capacity(DEDUPE_METADATA_FIELDS.len() + 2);
    parts.push(event.event_name.clone());
    parts.push(user_storage_key(sdk_key, event.user.as_ref()));
    for field in DEDUPE_METADATA_FIELDS {
        parts.push(event.metadata_str(field).unwrap_or_default());
    }
    parts.join("|")
}

/// Bounded "seen recently" cache for exposure keys.
#[derive(Debug)]
pub struct ExposureDeduper {
    window_ms: i64,
    max_keys: usize,
    seen: HashMap<String, i64>,
}

impl ExposureDeduper {
    pub fn new(window: Duration, max_keys: usize) -> Self {
        Self {
            window_ms: window.as_millis() as i64,
            max_keys,
            seen: HashMap::new(),
        }
    }

    /// Returns `true` when `key` has not been seen within the window, and
    /// records it. Returns `false` for a duplicate.
    pub fn check_and_record(&mut self, key: &str, now_ms: i64) -> bool {
        if let Some(&last) = self.seen.get(key)
            && now_ms - last < self.window_ms
        {
            return false;
        }

        self.seen.insert(key.to_string(), now_ms);

        if self.seen.len() > self.max_keys {
            debug!(keys = self.seen.len(), "Exposure dedupe cache full; clearing");
            self.seen.clear();
        }

        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for ExposureDeduper {
    fn default() -> Self {
        Self::new(DEDUPE_WINDOW, MAX_DEDUPE_KEYS)
    }
}
