use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://www.themealdb.com/api/json/v1/1";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a positive number of seconds, got {value:?}")]
    InvalidTimeout { key: &'static str, value: String },

    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

/// Settings read from the environment (after `.env` is loaded). The bot
/// token itself is read by teloxide from `TELOXIDE_TOKEN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub request_timeout: Duration,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = match lookup("MEALDB_API_URL") {
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::Empty {
                    key: "MEALDB_API_URL",
                })
            }
            Some(url) => url.trim().to_string(),
            None => DEFAULT_API_URL.to_string(),
        };

        let request_timeout = match lookup("MEALDB_TIMEOUT_SECS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        key: "MEALDB_TIMEOUT_SECS",
                        value,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let log_level = lookup("COOKING_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Config {
            api_url,
            request_timeout,
            log_level,
        })
    }
}
