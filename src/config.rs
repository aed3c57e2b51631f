//! Configuration for the HTTP retry client and schema inference
//!
//! Provides builder patterns for `RetryPolicy` and `SchemaOptions`.

use std::time::Duration;

/// Statuses retried by default: rate limiting and transient unavailability
pub const DEFAULT_STATUS_FORCELIST: &[u16] = &[429, 503, 504];

/// Idempotent methods retried on a status or timeout by default
pub const DEFAULT_ALLOWED_METHODS: &[&str] = &["DELETE", "GET", "HEAD", "OPTIONS", "PUT", "TRACE"];

/// Retry policy for `RetryingClient`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt (default: 20)
    pub max_retries: u32,
    /// Base delay, doubled on every retry (default: 100ms)
    pub backoff_factor: Duration,
    /// Upper bound for a single delay (default: 120s)
    pub max_backoff: Duration,
    /// Response statuses that trigger a retry (default: 429, 503, 504)
    pub status_forcelist: Vec<u16>,
    /// Methods retried after a forcelisted status or a timeout
    ///
    /// Connection failures are retried for every method since the request
    /// never reached the server.
    pub allowed_methods: Vec<String>,
    /// Whether an integer `Retry-After` header overrides the computed delay
    pub respect_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 20,
            backoff_factor: Duration::from_millis(100),
            max_backoff: Duration::from_secs(120),
            status_forcelist: DEFAULT_STATUS_FORCELIST.to_vec(),
            allowed_methods: DEFAULT_ALLOWED_METHODS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            respect_retry_after: true,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Whether a response with this status should be retried
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.status_forcelist.contains(&status)
    }

    /// Whether a request with this method may be sent again after it reached the server
    pub fn allows_method(&self, method: &str) -> bool {
        self.allowed_methods
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(method))
    }

    /// Delay before the given retry (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = (retry - 1).min(31);
        self.backoff_factor
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Builder for RetryPolicy
#[derive(Debug)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
        }
    }

    /// Set the maximum number of retries (default: 20)
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.policy.max_retries = retries;
        self
    }

    /// Set the base backoff delay (default: 100ms)
    pub fn backoff_factor(mut self, factor: Duration) -> Self {
        self.policy.backoff_factor = factor;
        self
    }

    /// Set the maximum delay between attempts (default: 120s)
    pub fn max_backoff(mut self, max: Duration) -> Self {
        self.policy.max_backoff = max;
        self
    }

    /// Replace the list of retried statuses
    pub fn status_forcelist(mut self, statuses: impl Into<Vec<u16>>) -> Self {
        self.policy.status_forcelist = statuses.into();
        self
    }

    /// Replace the list of methods retried on a status or timeout
    pub fn allowed_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.allowed_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable honoring `Retry-After` (default: true)
    pub fn respect_retry_after(mut self, enabled: bool) -> Self {
        self.policy.respect_retry_after = enabled;
        self
    }

    /// Disable retries entirely
    pub fn without_retries(mut self) -> Self {
        self.policy.max_retries = 0;
        self
    }

    /// Build the policy
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for BigQuery schema inference
#[derive(Debug, Clone)]
pub struct SchemaOptions {
    /// Mark fields that are filled in every record as REQUIRED (default: false)
    pub infer_mode: bool,
    /// Keep fields that only ever held null or empty values as STRING (default: false)
    pub keep_nulls: bool,
    /// Treat quoted numbers and booleans as plain strings (default: false)
    pub quoted_values_are_strings: bool,
    /// Log progress every N records, 0 disables (default: 500)
    pub debugging_interval: usize,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            infer_mode: false,
            keep_nulls: false,
            quoted_values_are_strings: false,
            debugging_interval: 500,
        }
    }
}

impl SchemaOptions {
    /// Create a new options builder
    pub fn builder() -> SchemaOptionsBuilder {
        SchemaOptionsBuilder::new()
    }
}

/// Builder for SchemaOptions
#[derive(Debug)]
pub struct SchemaOptionsBuilder {
    options: SchemaOptions,
}

impl SchemaOptionsBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            options: SchemaOptions::default(),
        }
    }

    /// Enable or disable REQUIRED mode inference
    pub fn infer_mode(mut self, enabled: bool) -> Self {
        self.options.infer_mode = enabled;
        self
    }

    /// Enable or disable keeping null-only fields
    pub fn keep_nulls(mut self, enabled: bool) -> Self {
        self.options.keep_nulls = enabled;
        self
    }

    /// Enable or disable treating quoted values as strings
    pub fn quoted_values_are_strings(mut self, enabled: bool) -> Self {
        self.options.quoted_values_are_strings = enabled;
        self
    }

    /// Set the progress logging interval
    pub fn debugging_interval(mut self, interval: usize) -> Self {
        self.options.debugging_interval = interval;
        self
    }

    /// Build the options
    pub fn build(self) -> SchemaOptions {
        self.options
    }
}

impl Default for SchemaOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
