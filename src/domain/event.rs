use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const GATE_EXPOSURE_EVENT: &str = "sdk::gate_exposure";
pub const CONFIG_EXPOSURE_EVENT: &str = "sdk::config_exposure";
pub const LAYER_EXPOSURE_EVENT: &str = "sdk::layer_exposure";
pub const NON_EXPOSED_CHECKS_EVENT: &str = "sdk::non_exposed_checks";

const CURRENT_PAGE_KEY: &str = "currentPage";

/// User context attached to an event.
///
/// `private_attributes` are accepted from producers but never leave the process:
/// they are stripped during normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUser {
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "customIDs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_ids: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_attributes: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<BTreeMap<String, String>>,
}

impl EventUser {
    pub fn with_user_id(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }
}

/// A single telemetry event.
///
/// Producers build events freely; once an event passes through
/// [`Event::normalized`] the pipeline treats it as immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<EventUser>,
    /// Milliseconds since the Unix epoch.
    #[serde(default = "now_millis")]
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_metadata: Option<Map<String, Value>>,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Event {
    /// Create an event stamped with the current wall-clock time.
    pub fn new(event_name: impl Into<String>) -> Self {
        Self::at(event_name, now_millis())
    }

    pub fn at(event_name: impl Into<String>, time: i64) -> Self {
        Self {
            event_name: event_name.into(),
            value: None,
            metadata: None,
            user: None,
            time,
            sdk_metadata: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_user(mut self, user: EventUser) -> Self {
        self.user = Some(user);
        self
    }

    /// Exposure events are subject to deduplication.
    pub fn is_exposure(&self) -> bool {
        matches!(
            self.event_name.as_str(),
            GATE_EXPOSURE_EVENT | CONFIG_EXPOSURE_EVENT | LAYER_EXPOSURE_EVENT
        )
    }

    /// Metadata field rendered as a string; strings are returned unquoted.
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        let value = self.metadata.as_ref()?.get(key)?;
        match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Strip private user attributes and inject contextual fields.
    pub fn normalized(mut self, current_page: Option<&str>) -> Self {
        if let Some(user) = self.user.as_mut() {
            user.private_attributes = None;
        }

        if let Some(page) = current_page {
            self.sdk_metadata
                .get_or_insert_with(Map::new)
                .insert(CURRENT_PAGE_KEY.to_string(), Value::String(page.to_string()));
        }

        self
    }
}
