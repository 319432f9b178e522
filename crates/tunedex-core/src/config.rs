//! Configuration module
//!
//! Environment-driven configuration for the orchestrator and its adapters.
//! Every knob has a default so a bare process comes up usable; `validate()`
//! rejects values that would break invariants (zero ceilings, empty URLs).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_RECOGNIZE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RECOGNIZE_MAX_RETRIES: u32 = 3;
const DEFAULT_HANDLER_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;
const DEFAULT_MAX_DURATION_SECS: u64 = 600;
const DEFAULT_RATE_LIMIT_CEILING: u32 = 60;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 3600;
const DEFAULT_CACHE_TTL_SECS: u64 = 900;
const DEFAULT_CACHE_CAPACITY: usize = 1024;
const DEFAULT_ARTIFACT_GRACE_SECS: u64 = 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the external fingerprint-matching service
    pub fingerprint_url: String,
    /// API key for the fingerprint service, if it requires one
    pub fingerprint_api_key: Option<String>,
    pub recognize_timeout: Duration,
    /// Attempt budget for retryable failures (upstream outage, timeout)
    pub max_retries: u32,
    /// Per-attempt execution deadline for any handler invocation
    pub handler_timeout: Duration,
    pub max_file_size_bytes: u64,
    pub max_duration: Duration,
    pub rate_limit_ceiling: u32,
    pub rate_limit_window: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    /// Directory holding temporary artifacts
    pub artifact_dir: PathBuf,
    /// How long a delivered artifact survives before deferred release
    pub artifact_grace: Duration,
    pub sweep_interval: Duration,
    /// Extraction backend binary (yt-dlp compatible)
    pub extractor_bin: String,
    pub retry_backoff: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        // Load .env if present; real env vars win
        dotenvy::dotenv().ok();

        let config = Self {
            fingerprint_url: env_or(
                "TUNEDEX_FINGERPRINT_URL",
                "https://amp.shazam.com".to_string(),
            ),
            fingerprint_api_key: env::var("TUNEDEX_FINGERPRINT_API_KEY").ok(),
            recognize_timeout: Duration::from_secs(parse_env(
                "TUNEDEX_RECOGNIZE_TIMEOUT_SECS",
                DEFAULT_RECOGNIZE_TIMEOUT_SECS,
            )),
            max_retries: parse_env("TUNEDEX_MAX_RETRIES", DEFAULT_RECOGNIZE_MAX_RETRIES),
            handler_timeout: Duration::from_secs(parse_env(
                "TUNEDEX_HANDLER_TIMEOUT_SECS",
                DEFAULT_HANDLER_TIMEOUT_SECS,
            )),
            max_file_size_bytes: parse_env(
                "TUNEDEX_MAX_FILE_SIZE_BYTES",
                DEFAULT_MAX_FILE_SIZE_BYTES,
            ),
            max_duration: Duration::from_secs(parse_env(
                "TUNEDEX_MAX_DURATION_SECS",
                DEFAULT_MAX_DURATION_SECS,
            )),
            rate_limit_ceiling: parse_env("TUNEDEX_RATE_LIMIT_CEILING", DEFAULT_RATE_LIMIT_CEILING),
            rate_limit_window: Duration::from_secs(parse_env(
                "TUNEDEX_RATE_LIMIT_WINDOW_SECS",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            )),
            cache_ttl: Duration::from_secs(parse_env("TUNEDEX_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)),
            cache_capacity: parse_env("TUNEDEX_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY),
            artifact_dir: env::var("TUNEDEX_ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("tunedex")),
            artifact_grace: Duration::from_secs(parse_env(
                "TUNEDEX_ARTIFACT_GRACE_SECS",
                DEFAULT_ARTIFACT_GRACE_SECS,
            )),
            sweep_interval: Duration::from_secs(parse_env(
                "TUNEDEX_SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL_SECS,
            )),
            extractor_bin: env_or("TUNEDEX_EXTRACTOR_BIN", "yt-dlp".to_string()),
            retry_backoff: Duration::from_millis(parse_env(
                "TUNEDEX_RETRY_BACKOFF_MS",
                DEFAULT_RETRY_BACKOFF_MS,
            )),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.fingerprint_url.is_empty() {
            anyhow::bail!("TUNEDEX_FINGERPRINT_URL must not be empty");
        }
        if self.rate_limit_ceiling == 0 {
            anyhow::bail!("TUNEDEX_RATE_LIMIT_CEILING must be greater than 0");
        }
        if self.rate_limit_window.is_zero() {
            anyhow::bail!("TUNEDEX_RATE_LIMIT_WINDOW_SECS must be greater than 0");
        }
        if self.max_file_size_bytes == 0 {
            anyhow::bail!("TUNEDEX_MAX_FILE_SIZE_BYTES must be greater than 0");
        }
        if self.cache_capacity == 0 {
            anyhow::bail!("TUNEDEX_CACHE_CAPACITY must be greater than 0");
        }
        if self.handler_timeout.is_zero() {
            anyhow::bail!("TUNEDEX_HANDLER_TIMEOUT_SECS must be greater than 0");
        }
        if self.extractor_bin.is_empty() {
            anyhow::bail!("TUNEDEX_EXTRACTOR_BIN must not be empty");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fingerprint_url: "https://amp.shazam.com".to_string(),
            fingerprint_api_key: None,
            recognize_timeout: Duration::from_secs(DEFAULT_RECOGNIZE_TIMEOUT_SECS),
            max_retries: DEFAULT_RECOGNIZE_MAX_RETRIES,
            handler_timeout: Duration::from_secs(DEFAULT_HANDLER_TIMEOUT_SECS),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            max_duration: Duration::from_secs(DEFAULT_MAX_DURATION_SECS),
            rate_limit_ceiling: DEFAULT_RATE_LIMIT_CEILING,
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            artifact_dir: env::temp_dir().join("tunedex"),
            artifact_grace: Duration::from_secs(DEFAULT_ARTIFACT_GRACE_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            extractor_bin: "yt-dlp".to_string(),
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_file_size_bytes, 50 * 1024 * 1024);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.handler_timeout, Duration::from_secs(300));
    }

    #[test]
    fn zero_ceiling_rejected() {
        let config = Config {
            rate_limit_ceiling: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_extractor_rejected() {
        let config = Config {
            extractor_bin: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
