use super::request::{LogEventRequest, TransportResponse};
use super::serialization::PayloadSerializer;
use super::transport::{RequestTransport, TransportError};
use crate::reliability::{RetryConfig, RetryPolicy, is_retryable_status, is_success_status};
use async_trait::async_trait;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "x-api-key";
const CLIENT_TIME_HEADER: &str = "x-client-time";

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub max_connections: usize,
    pub keep_alive_timeout: Duration,
    pub user_agent: String,
    pub enable_compression: bool,
    pub retry: RetryConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            max_connections: 20,
            keep_alive_timeout: Duration::from_secs(60),
            user_agent: format!("rask-event-logger/{}", env!("CARGO_PKG_VERSION")),
            enable_compression: true,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub max_connections: usize,
    pub active_connections: usize,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time: Duration,
}

#[derive(Debug, Default)]
pub struct ClientStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    active_connections: AtomicUsize,
    total_response_time: AtomicU64,
}

impl ClientStats {
    pub fn record_request(&self, success: bool, response_time: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time
            .fetch_add(response_time.as_millis() as u64, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// reqwest-backed reliable transport.
///
/// One `post` is one logical delivery: retryable statuses and transient
/// network errors are retried up to `request.retries` times with backoff.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: TransportConfig,
    serializer: PayloadSerializer,
    retry_policy: RetryPolicy,
    stats: Arc<ClientStats>,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .pool_max_idle_per_host(config.max_connections)
            .pool_idle_timeout(config.keep_alive_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                TransportError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            retry_policy: RetryPolicy::new(config.retry.clone()),
            serializer: PayloadSerializer::new(),
            config,
            stats: Arc::new(ClientStats::default()),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        let total_requests = self.stats.total_requests.load(Ordering::Relaxed);
        let total_response_time = self.stats.total_response_time.load(Ordering::Relaxed);

        let average_response_time = if total_requests > 0 {
            Duration::from_millis(total_response_time / total_requests)
        } else {
            Duration::ZERO
        };

        ConnectionStats {
            max_connections: self.config.max_connections,
            active_connections: self.stats.active_connections.load(Ordering::Relaxed),
            total_requests,
            successful_requests: self.stats.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.stats.failed_requests.load(Ordering::Relaxed),
            average_response_time,
        }
    }

    async fn post_once(
        &self,
        request: &LogEventRequest,
    ) -> Result<TransportResponse, TransportError> {
        let allow_compression = self.config.enable_compression && request.is_compressable;
        let payload = self.serializer.encode(&request.data, allow_compression)?;
        let headers = build_headers(request, payload.compressed)?;

        let start = Instant::now();
        self.stats.active_connections.fetch_add(1, Ordering::Relaxed);
        let sent = self
            .client
            .post(request.url_with_params())
            .headers(headers)
            .body(payload.bytes)
            .send()
            .await;
        self.stats.active_connections.fetch_sub(1, Ordering::Relaxed);

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                self.stats.record_request(false, start.elapsed());
                return Err(e.into());
            }
        };

        let code = response.status().as_u16();
        self.stats
            .record_request(response.status().is_success(), start.elapsed());

        let body = response.text().await.ok().filter(|b| !b.is_empty());
        Ok(TransportResponse { code, body })
    }
}

fn build_headers(request: &LogEventRequest, compressed: bool) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if compressed {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }

    let api_key = HeaderValue::from_str(&request.sdk_key)
        .map_err(|e| TransportError::InvalidHeaderValue(format!("{API_KEY_HEADER}: {e}")))?;
    headers.insert(HeaderName::from_static(API_KEY_HEADER), api_key);

    let client_time = chrono::Utc::now().timestamp_millis().to_string();
    let client_time = HeaderValue::from_str(&client_time)
        .map_err(|e| TransportError::InvalidHeaderValue(format!("{CLIENT_TIME_HEADER}: {e}")))?;
    headers.insert(HeaderName::from_static(CLIENT_TIME_HEADER), client_time);

    Ok(headers)
}

#[async_trait]
impl RequestTransport for HttpTransport {
    async fn post(&self, request: &LogEventRequest) -> Result<TransportResponse, TransportError> {
        let mut attempt = 0;

        loop {
            let outcome = self.post_once(request).await;
            let retryable = match &outcome {
                Ok(response) => {
                    let code = i32::from(response.code);
                    !is_success_status(code) && is_retryable_status(code)
                }
                Err(e) => e.is_transient(),
            };

            if !retryable || attempt >= request.retries {
                return outcome;
            }

            let delay = self.retry_policy.calculate_delay(attempt);
            match &outcome {
                Ok(response) => debug!(
                    status = response.code,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying log event request"
                ),
                Err(e) => warn!(
                    error = %e,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying log event request after network error"
                ),
            }

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
