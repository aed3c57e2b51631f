//! HTTP verbs with retry and exponential backoff
//!
//! Wraps `reqwest::Client` so that rate-limited or temporarily unavailable
//! endpoints are retried according to a `RetryPolicy`. Only the policy's
//! allowed (idempotent) methods are re-sent after a response or a timeout;
//! connection failures are retried for every method.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use tracing::{error, warn};

use crate::config::RetryPolicy;
use crate::error::Result;

/// HTTP client that retries transient failures
#[derive(Debug, Clone)]
pub struct RetryingClient {
    client: Client,
    policy: RetryPolicy,
}

impl Default for RetryingClient {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryingClient {
    /// Create a client with a fresh `reqwest::Client`
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_client(Client::new(), policy)
    }

    /// Wrap an existing client, e.g. one with default headers or auth set up
    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Perform a GET request with optional query parameters
    pub async fn get<P>(&self, url: &str, params: Option<&P>) -> Result<Response>
    where
        P: Serialize + ?Sized,
    {
        self.send_with_retry("GET", url, || {
            let request = self.client.get(url);
            match params {
                Some(params) => request.query(params),
                None => request,
            }
        })
        .await
    }

    /// Perform a POST request with an optional JSON body
    pub async fn post<B>(&self, url: &str, body: Option<&B>) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        self.send_with_retry("POST", url, || with_body(self.client.post(url), body))
            .await
    }

    /// Perform a PUT request with an optional JSON body
    pub async fn put<B>(&self, url: &str, body: Option<&B>) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        self.send_with_retry("PUT", url, || with_body(self.client.put(url), body))
            .await
    }

    async fn send_with_retry<F>(&self, method: &str, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let idempotent = self.policy.allows_method(method);
        let mut retry = 0;
        loop {
            let can_retry = retry < self.policy.max_retries;

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if can_retry && idempotent && self.policy.should_retry_status(status.as_u16())
                    {
                        retry += 1;
                        let delay = self.delay_for(retry, Some(&response));
                        warn!(
                            method,
                            url,
                            status = status.as_u16(),
                            retry,
                            delay_ms = delay.as_millis() as u64,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return response.error_for_status().map_err(|e| {
                        error!(method, url, status = status.as_u16(), "request failed");
                        e.into()
                    });
                }
                Err(e) if can_retry && (e.is_connect() || (idempotent && e.is_timeout())) => {
                    retry += 1;
                    let delay = self.delay_for(retry, None);
                    warn!(
                        method,
                        url,
                        error = %e,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(method, url, error = %e, "request failed");
                    return Err(e.into());
                }
            }
        }
    }

    fn delay_for(&self, retry: u32, response: Option<&Response>) -> Duration {
        let retry_after = response
            .filter(|_| self.policy.respect_retry_after)
            .and_then(|r| r.headers().get(RETRY_AFTER))
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);
        retry_after.unwrap_or_else(|| self.policy.backoff(retry))
    }
}

fn with_body<B: Serialize + ?Sized>(request: RequestBuilder, body: Option<&B>) -> RequestBuilder {
    match body {
        Some(body) => request.json(body),
        None => request,
    }
}

/// Parse an integer-seconds `Retry-After` value; HTTP dates are not supported
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
