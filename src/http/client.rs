//! HTTP client with retry and rate limiting
//!
//! Provides the HTTP client used by every record source:
//! - Fixed backoff retry on any non-200 response, optionally capped
//! - A shared rate limiter so concurrent streams stay inside the API budget
//! - Static auth headers on every request
//! - JSON body decoding

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::ApiKeyAuth;
use crate::config::HttpConfig;
use crate::error::{Error, Result};
use crate::types::BackoffType;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries (`None` retries forever)
    pub max_retries: Option<u32>,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            max_retries: Some(5),
            initial_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(600),
            backoff_type: BackoffType::Constant,
            rate_limit: Some(RateLimiterConfig::default()),
            user_agent: format!("dear-inventory-source/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    /// Build from the user-facing HTTP settings
    pub fn from_settings(base_url: impl Into<String>, settings: &HttpConfig) -> Self {
        Self::builder()
            .base_url(base_url)
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .max_retries(settings.max_retries)
            .backoff(
                settings.backoff_type,
                Duration::from_secs(settings.backoff_seconds),
                Duration::from_secs(settings.backoff_seconds.saturating_mul(10)),
            )
            .rate_limit(RateLimiterConfig::new(settings.requests_per_minute, 5))
            .build()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries (`None` retries forever)
    pub fn max_retries(mut self, retries: Option<u32>) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// What to do when a request gets a non-200 answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryMode {
    /// Back off and send the same request again
    #[default]
    Backoff,
    /// Back off on 429 and 5xx; return any other status as an error right away
    Transient,
    /// Return the status as an error right away
    Never,
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters
    pub query: BTreeMap<String, String>,
    /// Retry behaviour
    pub retry: RetryMode,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Set the retry mode
    #[must_use]
    pub fn retry(mut self, retry: RetryMode) -> Self {
        self.retry = retry;
        self
    }
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    auth: Option<ApiKeyAuth>,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            auth: None,
            rate_limiter,
        })
    }

    /// Create a client that attaches the auth headers to every request
    pub fn with_auth(config: HttpClientConfig, auth: ApiKeyAuth) -> Result<Self> {
        let mut client = Self::with_config(config)?;
        client.auth = Some(auth);
        Ok(client)
    }

    /// Client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// GET a path and decode the JSON body.
    ///
    /// Any status other than 200 is a failure. With `RetryMode::Backoff` the
    /// same request is re-sent after the configured delay until it succeeds or
    /// `max_retries` is used up; `RetryMode::Transient` does so only for 429
    /// and 5xx.
    pub async fn get_json(&self, path: &str, request: &RequestConfig) -> Result<Value> {
        let url = self.build_url(path, &request.query)?;
        let retries_allowed = |attempt: u32| match self.config.max_retries {
            None => true,
            Some(max) => attempt < max,
        };

        let mut attempt: u32 = 0;
        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let mut req = self.client.get(url.clone()).timeout(self.config.timeout);
            if let Some(ref auth) = self.auth {
                req = auth.apply(req);
            }

            match req.send().await {
                Ok(response) if response.status() == StatusCode::OK => {
                    debug!("GET {} succeeded", url);
                    let body = response.text().await?;
                    return serde_json::from_str(&body).map_err(|e| {
                        Error::decode(format!("Invalid JSON from {}: {e}", url.path()))
                    });
                }
                Ok(response) => {
                    let status = response.status().as_u16();

                    if request.retry != RetryMode::Backoff {
                        let body = response.text().await.unwrap_or_default();
                        let err = Error::http_status(status, body);
                        if request.retry == RetryMode::Never || !err.is_retryable() {
                            return Err(err);
                        }
                    }

                    if !retries_allowed(attempt) {
                        return Err(Error::RetriesExhausted {
                            attempts: attempt + 1,
                            last_status: Some(status),
                        });
                    }

                    let delay = self.calculate_backoff(attempt);
                    warn!(
                        "GET {} returned {}, attempt {}, retrying in {:?}",
                        url.path(),
                        status,
                        attempt + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if request.retry == RetryMode::Never || !retries_allowed(attempt) {
                        if e.is_timeout() {
                            return Err(Error::Timeout {
                                timeout_ms: self.config.timeout.as_millis() as u64,
                            });
                        }
                        return Err(Error::Http(e));
                    }

                    let delay = self.calculate_backoff(attempt);
                    warn!(
                        "GET {} failed ({}), attempt {}, retrying in {:?}",
                        url.path(),
                        e,
                        attempt + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Build full URL from a path and query parameters
    pub fn build_url(&self, path: &str, query: &BTreeMap<String, String>) -> Result<Url> {
        let mut url = if path.starts_with("http://") || path.starts_with("https://") {
            Url::parse(path)?
        } else {
            match &self.config.base_url {
                Some(base) => {
                    let base = if base.ends_with('/') {
                        Url::parse(base)?
                    } else {
                        Url::parse(&format!("{base}/"))?
                    };
                    base.join(path.trim_start_matches('/'))?
                }
                None => Url::parse(path)?,
            }
        };

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self
                .config
                .initial_backoff
                .checked_mul(attempt.saturating_add(1))
                .unwrap_or(self.config.max_backoff),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.config
                    .initial_backoff
                    .checked_mul(factor)
                    .unwrap_or(self.config.max_backoff)
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("auth", &self.auth)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}
