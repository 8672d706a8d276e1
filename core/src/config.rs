//! Client configuration.
//!
//! # Design
//! `ClientConfig` is assembled with chainable setters and becomes immutable
//! once handed to `ConfigClient`. Pool sizes map onto the transport agent's
//! idle-connection limits; `max_retries` bounds the transient-retry loop,
//! while `rate_limit_retries` separately caps the 429 wait-and-retry loop
//! (`None` keeps the source behavior of waiting indefinitely).

use std::time::Duration;

const DEFAULT_USER_AGENT: &str = concat!("llm-config-client/", env!("CARGO_PKG_VERSION"));

/// Settings for a `ConfigClient` instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, e.g. `http://localhost:8080/api/v1`. Trailing slash is
    /// stripped at construction.
    pub base_url: String,
    /// Bearer token attached to every request when present.
    pub auth_token: Option<String>,
    /// Per-call timeout applied at the transport layer.
    pub timeout: Duration,
    /// Maximum number of additional attempts for transient failures
    /// (5xx in {500, 502, 503, 504} and transport errors).
    pub max_retries: u32,
    /// Base delay for exponential backoff between transient retries.
    pub backoff_factor: Duration,
    /// Cap on 429 wait-and-retry cycles per logical request. `None` retries
    /// until the server stops rate limiting.
    pub rate_limit_retries: Option<u32>,
    /// Number of host connection pools kept by the transport.
    pub pool_connections: usize,
    /// Maximum idle connections kept per host.
    pub pool_maxsize: usize,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
            timeout: Duration::from_secs(10),
            max_retries: 3,
            backoff_factor: Duration::from_secs(1),
            rate_limit_retries: None,
            pool_connections: 10,
            pool_maxsize: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn backoff_factor(mut self, backoff_factor: Duration) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    pub fn rate_limit_retries(mut self, cap: Option<u32>) -> Self {
        self.rate_limit_retries = cap;
        self
    }

    pub fn pool_connections(mut self, pool_connections: usize) -> Self {
        self.pool_connections = pool_connections;
        self
    }

    pub fn pool_maxsize(mut self, pool_maxsize: usize) -> Self {
        self.pool_maxsize = pool_maxsize;
        self
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }
}
