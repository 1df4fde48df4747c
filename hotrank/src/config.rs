use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Shortest allowed polling interval.
pub const MIN_UPDATE_INTERVAL_SECS: u64 = 5;

/// Upper bound for `MAX_CONCURRENCY`.
pub const MAX_CONCURRENCY_LIMIT: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    pub update_interval_secs: u64,
    pub output_path: PathBuf,
    pub user_agent: String,
    pub sessdata: Option<String>,
    pub http_proxy: Option<String>,
    pub max_items: usize,
    pub max_concurrency: usize,
    pub request_interval_ms: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub api_base_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank or unparsable
    /// values fall back to the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            update_interval_secs: parse_or(text("UPDATE_INTERVAL_SEC"), 600)
                .max(MIN_UPDATE_INTERVAL_SECS),
            output_path: text("OUTPUT_PATH")
                .unwrap_or_else(|| "../data/data.json".to_string())
                .into(),
            user_agent: text("USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            sessdata: text("SESSDATA"),
            http_proxy: text("HTTP_PROXY"),
            max_items: parse_or(text("MAX_ITEMS"), 50).max(1),
            max_concurrency: parse_or(text("MAX_CONCURRENCY"), 6)
                .clamp(1, MAX_CONCURRENCY_LIMIT),
            request_interval_ms: parse_or(text("REQUEST_INTERVAL_MS"), 800),
            retry_attempts: parse_or(text("RETRY_ATTEMPTS"), 3).max(1),
            retry_backoff_ms: parse_or(text("RETRY_BACKOFF_MS"), 600),
            api_base_url: text("API_BASE_URL")
                .unwrap_or_else(|| "https://api.bilibili.com".to_string()),
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}
