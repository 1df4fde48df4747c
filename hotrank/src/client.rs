use anyhow::Context;
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue, ORIGIN, REFERER};
use reqwest::{Client, Proxy, Url};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AttemptError, FetchError};
use crate::rate_limit::RateLimiter;

/// One GET against a JSON endpoint. Implementations perform exactly one
/// request; pacing and retries live in [`RetryingFetcher`].
#[async_trait]
pub trait JsonTransport: Send + Sync {
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, AttemptError>;
}

/// reqwest-backed transport. Non-2xx statuses and undecodable bodies are
/// reported as attempt errors.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JsonTransport for HttpTransport {
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, AttemptError> {
        let url = Url::parse_with_params(url, params)
            .map_err(|e| AttemptError::Network(format!("invalid url {url}: {e}")))?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| AttemptError::Decode(e.to_string()))
    }
}

/// Builds the shared HTTP client. Headers, cookie and proxy are fixed at
/// construction; the client never picks up proxy variables from the process
/// environment on its own.
pub fn build_http_client(config: &Config) -> anyhow::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(REFERER, HeaderValue::from_static("https://www.bilibili.com/"));
    headers.insert(ORIGIN, HeaderValue::from_static("https://www.bilibili.com"));

    if let Some(sessdata) = &config.sessdata {
        let cookie = HeaderValue::from_str(&format!("SESSDATA={sessdata}"))
            .context("SESSDATA contains characters not allowed in a header")?;
        headers.insert(COOKIE, cookie);
    }

    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(5))
        .read_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(20))
        // At least one idle connection per in-flight enrichment
        .pool_max_idle_per_host(config.max_concurrency.saturating_mul(2));

    builder = match &config.http_proxy {
        Some(proxy) => {
            let proxy =
                Proxy::all(proxy).with_context(|| format!("invalid HTTP_PROXY {proxy}"))?;
            builder.proxy(proxy)
        }
        None => builder.no_proxy(),
    };

    builder.build().context("failed to build HTTP client")
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(600),
            max_jitter: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.retry_attempts.max(1),
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
            ..Self::default()
        }
    }

    /// Delay after the failed attempt `attempt` (0-based):
    /// `base * 2^attempt + jitter`, with `jitter_fraction` in `[0, 1)`.
    pub fn backoff(&self, attempt: u32, jitter_fraction: f64) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let jitter = self.max_jitter.mul_f64(jitter_fraction.clamp(0.0, 1.0));
        self.base_backoff.saturating_mul(factor) + jitter
    }
}

/// Paced, retrying GET for endpoints that answer with a JSON object.
pub struct RetryingFetcher {
    transport: Arc<dyn JsonTransport>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(
        transport: Arc<dyn JsonTransport>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            limiter,
            policy,
        }
    }

    /// Fetches `url` until it yields a JSON object or the attempt budget is
    /// spent. Every attempt, retries included, goes through the rate limiter.
    pub async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Map<String, Value>, FetchError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            self.limiter.wait().await;

            let cause = match self.transport.get_json(url, params).await {
                Ok(Value::Object(map)) => return Ok(map),
                Ok(_) => AttemptError::NotAnObject,
                Err(e) => e,
            };

            attempt += 1;
            if attempt >= attempts {
                tracing::warn!(
                    "Request to {} failed (attempt {}/{}), giving up: {}",
                    url,
                    attempt,
                    attempts,
                    cause
                );
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts,
                    last: cause,
                });
            }

            let delay = self.policy.backoff(attempt - 1, rand::thread_rng().r#gen::<f64>());
            tracing::warn!(
                "Request to {} failed (attempt {}/{}), retrying in {:.2}s: {}",
                url,
                attempt,
                attempts,
                delay.as_secs_f64(),
                cause
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// The `code` field every endpoint carries; `0` means success.
pub fn response_code(body: &Map<String, Value>) -> Option<i64> {
    body.get("code").and_then(Value::as_i64)
}

/// Takes the `data` object out of a response, or an empty map when it is
/// missing or not an object.
pub fn take_data(mut body: Map<String, Value>) -> Map<String, Value> {
    match body.remove("data") {
        Some(Value::Object(data)) => data,
        _ => Map::new(),
    }
}
