use super::{Config, ConfigError};

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_url()?;

        if self.sdk_key.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "SDK key must not be empty".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.max_pending_batches == 0 {
            return Err(ConfigError::InvalidConfig(
                "Max pending batches must be greater than 0".to_string(),
            ));
        }

        if self.min_flush_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Minimum flush interval must be greater than 0".to_string(),
            ));
        }

        if self.min_flush_interval_ms > self.max_flush_interval_ms {
            return Err(ConfigError::InvalidConfig(format!(
                "Minimum flush interval ({}ms) must not exceed maximum flush interval ({}ms)",
                self.min_flush_interval_ms, self.max_flush_interval_ms
            )));
        }

        // Timeouts
        if self.connection_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        if self.retry.base_delay > self.retry.max_delay {
            return Err(ConfigError::InvalidConfig(
                "Retry base delay must not exceed max delay".to_string(),
            ));
        }

        Ok(())
    }
}
