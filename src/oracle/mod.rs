// Oracle transport
// Blocking HTTP access to the embedding and generation services, with an explicit
// timeout and a pluggable retry policy shared by every provider.

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::ChatError;
use crate::config::Config;

const DEFAULT_BASE_DELAY_MS: u64 = 1000;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

/// How many times an oracle call is attempted and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// A single attempt, no retries
    #[inline]
    pub const fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// `attempts` total tries with exponential backoff starting at one second
    #[inline]
    pub fn exponential(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }

    #[inline]
    pub const fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    #[inline]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay to wait after the given failed attempt (1-based)
    #[inline]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = EXPONENTIAL_BACKOFF_BASE.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// JSON-over-HTTP client for one oracle endpoint
#[derive(Debug, Clone)]
pub struct HttpOracle {
    base_url: Url,
    agent: ureq::Agent,
    bearer_token: Option<String>,
    retry: RetryPolicy,
}

impl HttpOracle {
    #[inline]
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self {
            base_url,
            agent: build_agent(timeout),
            bearer_token: None,
            retry: RetryPolicy::none(),
        }
    }

    /// Transport for the Cohere API. Fails when the API key variable is unset.
    #[inline]
    pub fn cohere(config: &Config) -> Result<Self, ChatError> {
        let base_url = config.cohere.api_url()?;
        let api_key = config.cohere_api_key()?;

        Ok(Self::new(base_url, config.timeout())
            .with_bearer_token(api_key)
            .with_retry_policy(config.retry_policy()))
    }

    /// Transport for a local Ollama server
    #[inline]
    pub fn ollama(config: &Config) -> Result<Self, ChatError> {
        let base_url = config.ollama.ollama_url()?;

        Ok(Self::new(base_url, config.timeout()).with_retry_policy(config.retry_policy()))
    }

    #[inline]
    pub fn with_bearer_token(mut self, token: String) -> Self {
        self.bearer_token = Some(token);
        self
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    #[inline]
    pub fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))?;

        debug!("GET {}", url);

        let response_text = self.request_with_retry(|| {
            let mut request = self.agent.get(url.as_str());
            if let Some(token) = &self.bearer_token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            request
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        serde_json::from_str(&response_text)
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    #[inline]
    pub fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))?;

        let request_json = serde_json::to_string(body).context("Failed to serialize request")?;

        debug!("POST {} ({} bytes)", url, request_json.len());

        let response_text = self.request_with_retry(|| {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            if let Some(token) = &self.bearer_token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            request
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        serde_json::from_str(&response_text)
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    fn request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let attempts = self.retry.attempts();
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!("HTTP request attempt {}/{}", attempt, attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    if !is_retryable(&error) {
                        warn!("Non-retryable error: {}", error);
                        return Err(describe_error(&error));
                    }

                    warn!(
                        "Transient error: {}, attempt {}/{}",
                        error, attempt, attempts
                    );
                    last_error = Some(describe_error(&error));

                    if attempt < attempts {
                        let delay = self.retry.delay_after(attempt);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Server errors, rate limiting and transport failures are worth another try
pub(crate) fn is_retryable(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::StatusCode(status) => *status >= 500 || *status == 429,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => true,
        _ => false,
    }
}

fn describe_error(error: &ureq::Error) -> anyhow::Error {
    match error {
        ureq::Error::StatusCode(status) if (400..500).contains(status) => {
            anyhow::anyhow!("Client error: HTTP {}", status)
        }
        ureq::Error::StatusCode(status) => anyhow::anyhow!("Server error: HTTP {}", status),
        other => anyhow::anyhow!("Request error: {}", other),
    }
}
