//! Shared HTTP plumbing for the marketplace and chat APIs: bearer auth,
//! per-request timeouts, and retry of transient failures with exponential
//! backoff plus jitter.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::{error_logging, AppError, AppResult};

/// Statuses worth retrying
const RETRYABLE_STATUSES: &[StatusCode] = &[
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Retry settings for API calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Upper bound for the exponential part of the delay
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

/// Calculate retry delay with exponential backoff
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay)
/// final_delay = delay + random(0, delay/4)
/// ```
///
/// `attempt` is 1-based (first retry = 1).
pub fn calculate_retry_delay(attempt: u32, policy: &RetryPolicy) -> u64 {
    let exponent = attempt.saturating_sub(1).min(32);
    let delay = policy
        .base_delay_ms
        .saturating_mul(1_u64 << exponent)
        .min(policy.max_delay_ms);

    // Jitter spreads retries of concurrent failures
    let jitter = rand::random::<u64>() % (delay / 4).max(1);
    delay + jitter
}

/// Authenticated JSON client bound to one API base URL
#[derive(Clone)]
pub struct WbHttpClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl WbHttpClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        let auth_header = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_header)
                .map_err(|e| AppError::Config(format!("invalid API key header: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// Absolute URL of an endpoint under the base URL
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        endpoint: &str,
        query: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> AppResult<T> {
        let url = self.url(endpoint);
        let body = self
            .send_with_retry(operation, &url, || {
                let mut request = self.http.get(&url).query(query);
                if let Some(timeout) = timeout {
                    request = request.timeout(timeout);
                }
                request
            })
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn post_json(
        &self,
        operation: &str,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> AppResult<Vec<u8>> {
        let url = self.url(endpoint);
        self.send_with_retry(operation, &url, || self.http.post(&url).json(payload))
            .await
    }

    async fn send_with_retry<F>(&self, operation: &str, url: &str, build: F) -> AppResult<Vec<u8>>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(operation = %operation, url = %url, attempt, "Sending API request");

            let failure = match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.bytes().await?.to_vec());
                    }
                    let body = response.text().await.unwrap_or_default();
                    let error = AppError::Network(format!(
                        "{} returned {}: {}",
                        operation,
                        status,
                        truncate_for_log(&body, 200)
                    ));
                    if !RETRYABLE_STATUSES.contains(&status) {
                        error_logging::log_network_error(&error, operation, Some(url), Some(attempt));
                        return Err(error);
                    }
                    error
                }
                Err(e) => AppError::Network(format!("{} failed: {}", operation, e)),
            };

            if attempt >= max_attempts {
                error_logging::log_network_error(&failure, operation, Some(url), Some(attempt));
                return Err(failure);
            }

            let delay_ms = calculate_retry_delay(attempt, &self.retry);
            warn!(operation = %operation, attempt, delay_ms, error = %failure, "API request failed, retrying");
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}

/// Cut a response body for log output on a char boundary
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}
