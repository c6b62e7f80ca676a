use log::LevelFilter;
use serde::Deserialize;
use std::{env, fs::read_to_string, path::Path, time::Duration};

/// The client version extracted from the Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable key to load the config from
const CONFIG_ENV_KEY: &str = "TR_CONFIG_JSON";

pub fn load_config() -> Option<Config> {
    // Attempt to load the config from the env
    if let Ok(env) = env::var(CONFIG_ENV_KEY) {
        let config: Config = match serde_json::from_str(&env) {
            Ok(value) => value,
            Err(err) => {
                eprintln!("Failed to load env config (Using default): {:?}", err);
                return None;
            }
        };
        return Some(config);
    }

    // Attempt to load the config from disk
    let file = Path::new("config.json");
    if !file.exists() {
        return None;
    }

    let data = match read_to_string(file) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to load config file (Using defaults): {:?}", err);
            return None;
        }
    };

    let config: Config = match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to load config file (Using default): {:?}", err);
            return None;
        }
    };

    Some(config)
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the backend, trailing slashes are stripped
    pub backend_url: String,
    /// Path of the file used for the persisted client cache
    pub storage_file: String,
    /// Directory log files are written to
    pub logging_dir: String,
    pub logging: LevelFilter,
    pub fetch: FetchPolicy,
    /// Interval between countdown display recomputations in milliseconds
    pub tick_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8080".to_string(),
            storage_file: "data/client-cache.json".to_string(),
            logging_dir: "data/logs".to_string(),
            logging: LevelFilter::Info,
            fetch: FetchPolicy::default(),
            tick_interval: 250,
        }
    }
}

impl Config {
    /// Base URL of the backend with any trailing slashes removed so
    /// paths can be appended directly
    pub fn backend_url(&self) -> String {
        self.backend_url.trim_end_matches('/').to_string()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval)
    }
}

/// Configuration for the bounded-retry snapshot fetch
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchPolicy {
    /// Total attempts before the fetch is given up on
    pub attempts: u32,
    /// Seconds a single attempt may take before it is aborted
    pub attempt_timeout: u64,
    /// Base backoff delay in milliseconds, doubled per failed attempt
    pub backoff_base: u64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            attempt_timeout: 60,
            backoff_base: 2000,
        }
    }
}

impl FetchPolicy {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout)
    }

    /// Backoff delay before retrying after the provided zero-based
    /// failed attempt. Saturates so a huge configured attempt budget
    /// can't overflow the doubling.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_base.saturating_mul(factor))
    }
}

#[cfg(test)]
mod test {
    use super::{Config, FetchPolicy};
    use std::time::Duration;

    /// Tests that trailing slashes are stripped from the backend URL
    #[test]
    fn test_backend_url_trimmed() {
        let config = Config {
            backend_url: "http://localhost:8080/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.backend_url(), "http://localhost:8080");
    }

    /// Tests the exponential backoff delay sequence
    #[test]
    fn test_backoff_delay() {
        let policy = FetchPolicy {
            backoff_base: 2000,
            ..Default::default()
        };
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(4000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(8000));
    }

    /// Tests that an absurd attempt number saturates the backoff
    /// instead of overflowing
    #[test]
    fn test_backoff_delay_saturates() {
        let policy = FetchPolicy {
            backoff_base: 2000,
            ..Default::default()
        };
        assert_eq!(policy.backoff_delay(200), Duration::from_millis(u64::MAX));
        assert_eq!(policy.backoff_delay(63), Duration::from_millis(u64::MAX));
    }

    /// Tests that an empty config document produces the defaults
    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.fetch.attempts, 3);
        assert_eq!(config.fetch.attempt_timeout, 60);
        assert_eq!(config.tick_interval, 250);
    }
}
