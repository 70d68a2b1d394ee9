//! Configuration types for http-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
///
/// All values have sensible defaults, so `Config::default()` works out of the
/// box. Applications embedding the library typically deserialize this from
/// their own settings source and call [`Config::validate`] once at startup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Partial/completed file storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry/backoff settings for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Task database settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Batch worker settings
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl Config {
    /// Check all tunables for values the engine cannot run with
    ///
    /// Returns [`Error::Config`] naming the offending key. Invalid tunables
    /// are fatal at startup, so callers should validate before constructing
    /// any component.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_tries == 0 {
            return Err(Error::Config {
                message: "retry.max_tries must be at least 1".to_string(),
                key: Some("retry.max_tries".to_string()),
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: format!(
                    "retry.backoff_multiplier must be >= 1.0, got {}",
                    self.retry.backoff_multiplier
                ),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        if self.download.max_attempts == 0 {
            return Err(Error::Config {
                message: "download.max_attempts must be at least 1".to_string(),
                key: Some("download.max_attempts".to_string()),
            });
        }
        if self.download.max_concurrent == 0 {
            return Err(Error::Config {
                message: "download.max_concurrent must be at least 1".to_string(),
                key: Some("download.max_concurrent".to_string()),
            });
        }
        Ok(())
    }
}

/// Partial/completed file storage configuration
///
/// The two directories are disjoint: a file lives under `partial_dir` while
/// being downloaded and is renamed into `completed_dir` once fully retrieved.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for in-progress partial files (default: "./partial")
    #[serde(default = "default_partial_dir")]
    pub partial_dir: PathBuf,

    /// Directory for fully retrieved files (default: "./completed")
    #[serde(default = "default_completed_dir")]
    pub completed_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            partial_dir: default_partial_dir(),
            completed_dir: default_completed_dir(),
        }
    }
}

/// Download behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Attempt budget per task across batch runs (default: 10)
    ///
    /// A task that fails with a transient error after this many attempts is
    /// marked Forbidden and never re-attempted.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Maximum concurrent transfers within one batch run (default: 8)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Per-read socket timeout while streaming a response body (default: 15 seconds)
    #[serde(default = "default_read_timeout", with = "duration_serde")]
    pub read_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_concurrent: default_max_concurrent(),
            read_timeout: default_read_timeout(),
        }
    }
}

/// Retry configuration for transient failures within a single fetch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of invocations, including the first (default: 5)
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Delay before the first retry (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Cap on the delay between retries (default: none, delays grow geometrically)
    #[serde(default, with = "optional_duration_serde")]
    pub max_delay: Option<Duration>,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tries: default_max_tries(),
            initial_delay: default_initial_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay: None,
            jitter: false,
        }
    }
}

/// Task database configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path to the SQLite task database (default: "./http-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Batch worker configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Time to wait between batch runs (default: 60 seconds)
    #[serde(default = "default_sleep_interval", with = "duration_serde")]
    pub sleep_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sleep_interval: default_sleep_interval(),
        }
    }
}

fn default_partial_dir() -> PathBuf {
    PathBuf::from("./partial")
}

fn default_completed_dir() -> PathBuf {
    PathBuf::from("./completed")
}

fn default_max_attempts() -> u32 {
    10
}

fn default_max_concurrent() -> usize {
    8
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_max_tries() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./http-dl.db")
}

fn default_sleep_interval() -> Duration {
    Duration::from_secs(60)
}

// Duration serialization helper (seconds as u64)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.download.max_attempts, 10);
        assert_eq!(config.download.max_concurrent, 8);
        assert_eq!(config.download.read_timeout, Duration::from_secs(15));
        assert_eq!(config.retry.max_tries, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(2));
        assert_eq!(config.retry.backoff_multiplier, 2.0);
        assert_eq!(config.retry.max_delay, None);
        assert!(!config.retry.jitter);
        assert_eq!(config.worker.sleep_interval, Duration::from_secs(60));
        assert_eq!(config.storage.partial_dir, PathBuf::from("./partial"));
        assert_eq!(config.storage.completed_dir, PathBuf::from("./completed"));
    }

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_max_tries_is_rejected() {
        let mut config = Config::default();
        config.retry.max_tries = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::Config { key: Some(ref k), .. } if k == "retry.max_tries"
        ));
    }

    #[test]
    fn sub_unit_backoff_multiplier_is_rejected() {
        let mut config = Config::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_attempts_is_rejected() {
        let mut config = Config::default();
        config.download.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_concurrent_is_rejected() {
        let mut config = Config::default();
        config.download.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.retry.max_tries, 5);
        assert_eq!(config.download.max_attempts, 10);
    }

    #[test]
    fn durations_round_trip_as_seconds() {
        let mut config = Config::default();
        config.retry.max_delay = Some(Duration::from_secs(30));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"initial_delay\":2"));
        assert!(json.contains("\"max_delay\":30"));

        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.retry.max_delay, Some(Duration::from_secs(30)));
        assert_eq!(parsed.worker.sleep_interval, Duration::from_secs(60));
    }
}
