use crate::domain::Event;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Synthetic status reported for a dispatched fire-and-forget request.
pub const BEACON_SUCCESS_STATUS: i32 = 200;

/// Retries the reliable transport performs on its own for one logical call.
pub const DEFAULT_TRANSPORT_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Credentials {
    #[default]
    SameOrigin,
    Include,
    Omit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkMetadata {
    pub sdk_type: String,
    pub sdk_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Default for SdkMetadata {
    fn default() -> Self {
        Self {
            sdk_type: "rask-event-logger".to_string(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            session_id: None,
        }
    }
}

/// JSON body of a log-event request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEventPayload {
    pub events: Vec<Event>,
    pub sdk_metadata: SdkMetadata,
}

/// Everything a transport needs to deliver one batch.
#[derive(Debug, Clone)]
pub struct LogEventRequest {
    pub sdk_key: String,
    pub url: Url,
    pub data: LogEventPayload,
    pub retries: u32,
    pub is_compressable: bool,
    pub params: BTreeMap<String, String>,
    pub credentials: Credentials,
}

impl LogEventRequest {
    pub fn new(
        sdk_key: impl Into<String>,
        url: Url,
        events: Vec<Event>,
        sdk_metadata: SdkMetadata,
    ) -> Self {
        let mut params = BTreeMap::new();
        params.insert("event_count".to_string(), events.len().to_string());

        Self {
            sdk_key: sdk_key.into(),
            url,
            data: LogEventPayload {
                events,
                sdk_metadata,
            },
            retries: DEFAULT_TRANSPORT_RETRIES,
            is_compressable: true,
            params,
            credentials: Credentials::SameOrigin,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn event_count(&self) -> usize {
        self.data.events.len()
    }

    /// Target URL with `params` appended as query pairs.
    pub fn url_with_params(&self) -> Url {
        let mut url = self.url.clone();
        if !self.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.params {
                pairs.append_pair(key, value);
            }
        }
        url
    }
}

/// What the reliable transport got back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub code: u16,
    pub body: Option<String>,
}

/// Outcome of one delivery attempt. `status_code` is -1 when no HTTP status
/// was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendResult {
    pub success: bool,
    pub status_code: i32,
}

impl SendResult {
    pub fn failure() -> Self {
        Self {
            success: false,
            status_code: crate::reliability::NETWORK_FAILURE_STATUS,
        }
    }
}
