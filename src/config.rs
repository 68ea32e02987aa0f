use thiserror::Error;

pub const KEY_VAR: &str = "NOTION_RSS_KEY";
pub const FEEDS_DB_VAR: &str = "NOTION_RSS_FEEDS_DATABASE_ID";
pub const CONTENT_DB_VAR: &str = "NOTION_RSS_CONTENT_DATABASE_ID";
pub const POLL_INTERVAL_VAR: &str = "NOTION_RSS_POLL_INTERVAL";
pub const LOOKBACK_HOURS_VAR: &str = "NOTION_RSS_LOOKBACK_HOURS";
pub const REQUEST_TIMEOUT_VAR: &str = "NOTION_RSS_REQUEST_TIMEOUT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{0}` not set")]
    Missing(&'static str),
    #[error("`{var}` is not a valid {expected}: {value}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Notion integration token, treated as opaque.
    pub api_token: String,
    /// Database holding the feed source rows.
    pub feeds_database_id: String,
    /// Database receiving one page per ingested item.
    pub content_database_id: String,
    /// Poll interval in minutes
    pub poll_interval: u64,
    /// Only items published within this many hours are ingested.
    pub lookback_hours: i64,
    /// Deadline in seconds applied to every remote call.
    pub request_timeout: u64,
}

fn default_poll_interval() -> u64 {
    15
}

fn default_lookback_hours() -> i64 {
    24
}

fn default_request_timeout() -> u64 {
    30
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from any variable lookup (useful for testing).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let api_token = lookup(KEY_VAR).ok_or(ConfigError::Missing(KEY_VAR))?;
        let feeds_database_id = lookup(FEEDS_DB_VAR).ok_or(ConfigError::Missing(FEEDS_DB_VAR))?;
        let content_database_id =
            lookup(CONTENT_DB_VAR).ok_or(ConfigError::Missing(CONTENT_DB_VAR))?;

        let poll_interval = match lookup(POLL_INTERVAL_VAR) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                var: POLL_INTERVAL_VAR,
                expected: "minute count",
                value,
            })?,
            None => default_poll_interval(),
        };

        let lookback_hours = match lookup(LOOKBACK_HOURS_VAR) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                var: LOOKBACK_HOURS_VAR,
                expected: "hour count",
                value,
            })?,
            None => default_lookback_hours(),
        };

        let request_timeout = match lookup(REQUEST_TIMEOUT_VAR) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                var: REQUEST_TIMEOUT_VAR,
                expected: "second count",
                value,
            })?,
            None => default_request_timeout(),
        };

        Ok(Config {
            api_token,
            feeds_database_id,
            content_database_id,
            poll_interval,
            lookback_hours,
            request_timeout,
        })
    }
}
