use std::time::Duration;

use crate::error::{DispatchError, Result};

/// Configuration for the dispatcher core and its HTTP edge.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Capacity of the bounded job queue.
    pub queue_size: usize,
    /// Number of concurrent executor tasks. Must be > 0 and <= queue_size.
    pub concurrent_executors: usize,
    /// Per-job retry limit across workers.
    pub max_retries: u32,
    /// Period between health monitor sweeps.
    pub heartbeat_period: Duration,
    /// Consecutive failed probes before a worker is evicted.
    pub max_failed_probes: u32,
    /// Timeout applied to every outbound call (execute and health probes).
    pub outbound_timeout: Duration,
    /// Sleep between selector attempts when no worker is free.
    pub selector_backoff: Duration,
    /// Selector attempts before giving up with "no workers available".
    pub selector_max_tries: u32,
    /// Port the HTTP edge listens on.
    pub listen_port: u16,
    /// max_tokens forwarded by the /chat convenience endpoint.
    pub default_max_tokens: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_size: 5000,
            concurrent_executors: 10,
            max_retries: 3,
            heartbeat_period: Duration::from_secs(5),
            max_failed_probes: 3,
            outbound_timeout: Duration::from_secs(15),
            selector_backoff: Duration::from_millis(10),
            selector_max_tries: 1000,
            listen_port: 9000,
            default_max_tokens: 256,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrent_executors == 0 {
            return Err(DispatchError::Config(
                "concurrent_executors must be greater than zero".to_string(),
            ));
        }
        if self.concurrent_executors > self.queue_size {
            return Err(DispatchError::Config(
                "concurrent_executors must not exceed queue_size".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    pub fn with_executors(mut self, concurrent_executors: usize) -> Self {
        self.concurrent_executors = concurrent_executors;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_heartbeat_period(mut self, heartbeat_period: Duration) -> Self {
        self.heartbeat_period = heartbeat_period;
        self
    }

    pub fn with_max_failed_probes(mut self, max_failed_probes: u32) -> Self {
        self.max_failed_probes = max_failed_probes;
        self
    }

    pub fn with_outbound_timeout(mut self, outbound_timeout: Duration) -> Self {
        self.outbound_timeout = outbound_timeout;
        self
    }

    pub fn with_selector(mut self, backoff: Duration, max_tries: u32) -> Self {
        self.selector_backoff = backoff;
        self.selector_max_tries = max_tries;
        self
    }
}
