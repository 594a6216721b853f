//! Runtime configuration for the sync service.

use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::sync_engine::MAX_RETRIES;

pub const DEFAULT_HEALTH_PATH: &str = "/auth/v1/health";
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const ENV_PREFIX: &str = "DISASTERCONNECT_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },
}

/// Where the hosted API lives and how hard to try reaching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub api_url: String,
    pub api_key: String,
    /// Session token; requests fall back to the anon key when unset.
    pub access_token: Option<String>,
    pub health_path: String,
    pub probe_interval: Duration,
    pub retry_interval: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    /// `None` means the platform data directory.
    pub database_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            access_token: None,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            probe_interval: DEFAULT_PROBE_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: MAX_RETRIES,
            database_path: None,
        }
    }
}

impl SyncConfig {
    /// Read `DISASTERCONNECT_*` variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`SyncConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{ENV_PREFIX}{suffix}");
            lookup(&name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (name, v))
        };

        let mut config = Self::default();

        if let Some((_, v)) = var("API_URL") {
            config.api_url = v;
        }
        if let Some((_, v)) = var("API_KEY") {
            config.api_key = v;
        }
        if let Some((_, v)) = var("ACCESS_TOKEN") {
            config.access_token = Some(v);
        }
        if let Some((_, v)) = var("HEALTH_PATH") {
            config.health_path = v;
        }
        if let Some((name, v)) = var("PROBE_INTERVAL_SECS") {
            config.probe_interval = parse_secs(&name, &v)?;
        }
        if let Some((name, v)) = var("RETRY_INTERVAL_SECS") {
            config.retry_interval = parse_secs(&name, &v)?;
        }
        if let Some((name, v)) = var("REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_secs(&name, &v)?;
        }
        if let Some((name, v)) = var("MAX_RETRIES") {
            config.max_retries = parse_positive(&name, &v)?;
        }
        if let Some((_, v)) = var("DB_PATH") {
            config.database_path = Some(PathBuf::from(v));
        }

        Ok(config)
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn health_url(&self) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), self.health_path)
    }
}

fn parse_secs(var: &str, value: &str) -> Result<Duration, ConfigError> {
    parse_positive::<u64>(var, value).map(Duration::from_secs)
}

/// Parse an integer that must be at least 1.
fn parse_positive<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr<Err = ParseIntError> + Default + PartialEq,
{
    let invalid = |reason: String| ConfigError::Invalid {
        var: var.to_string(),
        value: value.to_string(),
        reason,
    };

    let parsed: T = value.parse().map_err(|e: ParseIntError| invalid(e.to_string()))?;
    if parsed == T::default() {
        return Err(invalid("must be at least 1".to_string()));
    }

    Ok(parsed)
}
