//! Configuration types for archive conversion

use crate::converter::core::{ConvertError, Result};
use std::time::Duration;

/// Configuration for packaging operations
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Fetch `http`/`https`/`ftp` references into the archive
    pub fetch_external: bool,
    /// Base URL for external references written without an authority
    pub base_url: Option<String>,
    /// Deflate level 0-9; `None` uses the format default
    pub compression_level: Option<i64>,
    pub max_concurrent_fetches: usize,
    /// Per-request timeout; a timeout counts as a failed fetch
    pub timeout: Duration,
    pub user_agent: String,
    pub max_retries: usize,
    /// Initial delay between retries (doubles each retry)
    pub retry_delay: Duration,
    /// Maximum retry delay cap
    pub max_retry_delay: Duration,
}

impl ConvertConfig {
    pub fn with_fetch_external(mut self, fetch_external: bool) -> Self {
        self.fetch_external = fetch_external;
        self
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_compression_level(mut self, level: i64) -> Self {
        self.compression_level = Some(level);
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Calculate retry delay for the given attempt using exponential backoff
    pub fn retry_delay_for(&self, attempt: usize) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1) as u32);
        let delay = (self.retry_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_retry_delay.as_millis() as u64))
    }

    /// Parsed base URL, if one is configured
    pub fn parsed_base_url(&self) -> Result<Option<url::Url>> {
        self.base_url
            .as_deref()
            .map(|base| {
                url::Url::parse(base).map_err(|e| ConvertError::Configuration {
                    message: format!("base URL '{}' is not absolute: {}", base, e),
                    field: Some("base_url".to_string()),
                })
            })
            .transpose()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(level) = self.compression_level {
            if !(0..=9).contains(&level) {
                return Err(ConvertError::Configuration {
                    message: format!("compression level {} is outside 0-9", level),
                    field: Some("compression_level".to_string()),
                });
            }
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConvertError::Configuration {
                message: "at least one concurrent fetch is required".to_string(),
                field: Some("max_concurrent_fetches".to_string()),
            });
        }
        self.parsed_base_url()?;
        Ok(())
    }

    /// Defaults overridden by `MVSX_*` variables (a `.env` file is honoured)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Ignore error if .env not present

        let mut config = Self::default();
        if let Some(value) = env_var("MVSX_FETCH_EXTERNAL") {
            config.fetch_external = parse_bool("MVSX_FETCH_EXTERNAL", &value)?;
        }
        if let Some(value) = env_var("MVSX_BASE_URL") {
            config.base_url = Some(value);
        }
        if let Some(value) = env_var("MVSX_COMPRESSION_LEVEL") {
            config.compression_level = Some(parse_number("MVSX_COMPRESSION_LEVEL", &value)?);
        }
        if let Some(value) = env_var("MVSX_MAX_CONCURRENT_FETCHES") {
            config.max_concurrent_fetches = parse_number("MVSX_MAX_CONCURRENT_FETCHES", &value)?;
        }
        if let Some(value) = env_var("MVSX_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse_number("MVSX_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = env_var("MVSX_USER_AGENT") {
            config.user_agent = value;
        }
        config.validate()?;
        Ok(config)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConvertError::Configuration {
            message: format!("{} must be a boolean, got '{}'", name, other),
            field: Some(name.to_string()),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConvertError::Configuration {
        message: format!("{} must be a number, got '{}'", name, value),
        field: Some(name.to_string()),
    })
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            fetch_external: true,
            base_url: None,
            compression_level: None,
            max_concurrent_fetches: 4,
            timeout: Duration::from_secs(30),
            user_agent: concat!("mvsx/", env!("CARGO_PKG_VERSION")).to_string(),
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConvertConfig::default();
        assert!(config.fetch_external);
        assert!(config.base_url.is_none());
        assert!(config.compression_level.is_none());
        assert_eq!(config.max_concurrent_fetches, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_delay_backoff_is_capped() {
        let config = ConvertConfig::default();
        assert_eq!(config.retry_delay_for(1), Duration::from_millis(500));
        assert_eq!(config.retry_delay_for(2), Duration::from_millis(1000));
        assert_eq!(config.retry_delay_for(3), Duration::from_millis(2000));
        assert_eq!(config.retry_delay_for(30), Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let err = ConvertConfig::default()
            .with_compression_level(12)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConvertError::Configuration { ref field, .. } if field.as_deref() == Some("compression_level")));

        let err = ConvertConfig::default()
            .with_max_concurrent_fetches(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConvertError::Configuration { .. }));

        let err = ConvertConfig::default()
            .with_base_url("not a url")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConvertError::Configuration { ref field, .. } if field.as_deref() == Some("base_url")));
    }

    #[test]
    fn test_parse_bool_values() {
        assert!(parse_bool("X", "Yes").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}
