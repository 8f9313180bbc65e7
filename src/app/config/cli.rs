use super::groups::{RetrySettings, StorageSettings};
use super::serde_helpers::{load_env_enum, load_env_path, load_env_string, load_env_var};
use super::{ConfigError, LogFormat, LogLevel, LoggingMode};
use crate::flush::FlushConfig;
use crate::logger::LoggerOptions;
use crate::sender::{SenderConfig, TransportConfig};
use crate::storage::DiskStorageConfig;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const CONFIG_ENV: &str = "RASK_EVENT_CONFIG";

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Client SDK key sent with every request
    #[arg(long, env = "RASK_SDK_KEY", default_value = "")]
    pub sdk_key: String,

    /// Event intake endpoint URL
    #[arg(
        long,
        env = "RASK_EVENT_ENDPOINT",
        default_value = "https://events.rask.dev/v1/rgstr"
    )]
    pub endpoint: String,

    /// Number of events per batch
    #[arg(long, env = "BATCH_SIZE", default_value = "100")]
    pub batch_size: usize,

    /// Maximum number of unsent batches held in memory
    #[arg(long, env = "MAX_PENDING_BATCHES", default_value = "10")]
    pub max_pending_batches: usize,

    /// Shortest scheduled flush interval in milliseconds
    #[arg(long, env = "MIN_FLUSH_INTERVAL_MS", default_value = "1000")]
    pub min_flush_interval_ms: u64,

    /// Longest scheduled flush interval in milliseconds
    #[arg(long, env = "MAX_FLUSH_INTERVAL_MS", default_value = "60000")]
    pub max_flush_interval_ms: u64,

    /// Whether events are sent, sent only from interactive hosts, or persisted locally
    #[arg(long, env = "LOGGING_ENABLED", default_value = "always")]
    pub logging_enabled: LoggingMode,

    /// Treat the host as interactive
    #[arg(long, env = "INTERACTIVE")]
    pub interactive: bool,

    /// Maximum number of events kept in the failure buffer
    #[arg(long, env = "MAX_FAILED_LOGS", default_value = "500")]
    pub max_failed_logs: usize,

    /// Directory for persisted events
    #[arg(
        long,
        env = "STORAGE_PATH",
        default_value = "/tmp/rask-event-logger/storage"
    )]
    pub storage_path: PathBuf,

    /// Request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Connection timeout in seconds
    #[arg(long, env = "CONNECTION_TIMEOUT_SECS", default_value = "10")]
    pub connection_timeout_secs: u64,

    /// Maximum idle HTTP connections per host
    #[arg(long, env = "MAX_CONNECTIONS", default_value = "20")]
    pub max_connections: usize,

    /// Retries the HTTP transport performs for one delivery
    #[arg(long, env = "TRANSPORT_RETRIES", default_value = "3")]
    pub transport_retries: u32,

    /// Send request bodies uncompressed
    #[arg(long, env = "DISABLE_COMPRESSION")]
    pub disable_compression: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", default_value = "compact")]
    pub log_format: LogFormat,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub min_flush_interval: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub max_flush_interval: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub request_timeout: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub connection_timeout: Duration,

    /// Backoff between transport retries (file only)
    #[arg(skip)]
    pub retry: RetrySettings,

    /// Disk storage settings, kept in sync with `storage_path`
    #[serde(skip)]
    #[arg(skip)]
    pub storage: StorageSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sdk_key: String::new(),
            endpoint: "https://events.rask.dev/v1/rgstr".to_string(),
            batch_size: 100,
            max_pending_batches: 10,
            min_flush_interval_ms: 1_000,
            max_flush_interval_ms: 60_000,
            logging_enabled: LoggingMode::Always,
            interactive: false,
            max_failed_logs: 500,
            storage_path: PathBuf::from("/tmp/rask-event-logger/storage"),
            request_timeout_secs: 30,
            connection_timeout_secs: 10,
            max_connections: 20,
            transport_retries: 3,
            disable_compression: false,
            log_level: LogLevel::Info,
            log_format: LogFormat::Compact,
            config_file: None,
            min_flush_interval: Duration::from_millis(1_000),
            max_flush_interval: Duration::from_millis(60_000),
            request_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            retry: RetrySettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Config::parse_from(args);
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    /// Build from environment variables only. `RASK_EVENT_CONFIG`, when set,
    /// holds a complete TOML document and wins over individual variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(inline) = std::env::var(CONFIG_ENV) {
            return Self::from_toml_str(&inline);
        }

        let mut config = Config::default();

        load_env_string("RASK_SDK_KEY", &mut config.sdk_key);
        load_env_string("RASK_EVENT_ENDPOINT", &mut config.endpoint);
        load_env_var("BATCH_SIZE", &mut config.batch_size)?;
        load_env_var("MAX_PENDING_BATCHES", &mut config.max_pending_batches)?;
        load_env_var("MIN_FLUSH_INTERVAL_MS", &mut config.min_flush_interval_ms)?;
        load_env_var("MAX_FLUSH_INTERVAL_MS", &mut config.max_flush_interval_ms)?;
        load_env_enum("LOGGING_ENABLED", &mut config.logging_enabled)?;
        load_env_var("INTERACTIVE", &mut config.interactive)?;
        load_env_var("MAX_FAILED_LOGS", &mut config.max_failed_logs)?;
        load_env_path("STORAGE_PATH", &mut config.storage_path);
        load_env_var("REQUEST_TIMEOUT_SECS", &mut config.request_timeout_secs)?;
        load_env_var("CONNECTION_TIMEOUT_SECS", &mut config.connection_timeout_secs)?;
        load_env_var("MAX_CONNECTIONS", &mut config.max_connections)?;
        load_env_var("TRANSPORT_RETRIES", &mut config.transport_retries)?;
        load_env_var("DISABLE_COMPRESSION", &mut config.disable_compression)?;
        load_env_enum("LOG_LEVEL", &mut config.log_level)?;
        load_env_enum("LOG_FORMAT", &mut config.log_format)?;

        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    /// CLI arguments (with clap's env fallbacks), replaced wholesale by the
    /// config file when one is given.
    pub fn from_args_and_env<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        if let Ok(inline) = std::env::var(CONFIG_ENV) {
            return Self::from_toml_str(&inline);
        }

        let config = Config::parse_from(args);
        if let Some(path) = &config.config_file {
            return Self::from_file(path);
        }

        let mut config = config;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        self.min_flush_interval = Duration::from_millis(self.min_flush_interval_ms);
        self.max_flush_interval = Duration::from_millis(self.max_flush_interval_ms);
        self.request_timeout = Duration::from_secs(self.request_timeout_secs);
        self.connection_timeout = Duration::from_secs(self.connection_timeout_secs);

        self.storage.storage_path = self.storage_path.clone();

        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid endpoint URL '{}': {}", self.endpoint, e))
        })
    }

    pub fn flush_config(&self) -> FlushConfig {
        FlushConfig {
            batch_size: self.batch_size,
            max_pending_batches: self.max_pending_batches,
            min_flush_interval: self.min_flush_interval,
            max_flush_interval: self.max_flush_interval,
            ..FlushConfig::default()
        }
    }

    pub fn logger_options(&self) -> LoggerOptions {
        LoggerOptions {
            logging_enabled: self.logging_enabled.into(),
            max_failed_logs: self.max_failed_logs,
            flush: self.flush_config(),
            ..LoggerOptions::default()
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.request_timeout,
            connection_timeout: self.connection_timeout,
            max_connections: self.max_connections,
            enable_compression: !self.disable_compression,
            retry: (&self.retry).into(),
            ..TransportConfig::default()
        }
    }

    pub fn sender_config(&self) -> Result<SenderConfig, ConfigError> {
        let mut sender = SenderConfig::new(self.sdk_key.clone(), self.endpoint_url()?);
        sender.transport_retries = self.transport_retries;
        Ok(sender)
    }

    pub fn storage_config(&self) -> DiskStorageConfig {
        (&self.storage).into()
    }
}
