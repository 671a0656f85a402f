//! HTTP engine configuration.

use std::time::Duration;

/// Tuning knobs for [`crate::HttpEngine`].
#[derive(Debug, Clone)]
pub struct HttpEngineConfig {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Retries for 5xx and network errors while opening a request.
    pub max_retries: u8,
    /// Base delay for exponential backoff between retries.
    pub retry_base_delay_ms: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for HttpEngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            max_retries: 2,
            retry_base_delay_ms: 250,
            user_agent: format!("xferd/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpEngineConfig {
    /// Set the retry count.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u8) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the backoff base delay.
    #[must_use]
    pub const fn with_retry_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_base_delay_ms = delay_ms;
        self
    }
}
