//! Overload-aware retry with randomized exponential backoff.
//!
//! Wraps [`RetryExecutor`] with a second, independent budget that is only
//! consumed when the server answers with an overload status. Between those
//! attempts the executor sleeps a jittered interval whose envelope grows
//! exponentially, so concurrently throttled clients spread back out instead
//! of hammering the server in lockstep.

use std::future::Future;
use std::time::Duration;

use log::{info, warn};
use rand::Rng;
use tokio::sync::watch;

use crate::errors::{Error, Result};
use crate::options::{CallOption, CallOptions};
use crate::retry::RetryExecutor;
use crate::status::is_server_overload;
use crate::transport::{HasStatus, NetworkError};
use crate::utils::sleep_interruptible;

/// Backoff parameters for overload retries.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    /// Minimum wait between overload retries.
    pub base: Duration,
    /// Per-retry growth of the jitter envelope.
    pub growth: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            growth: 3.0,
        }
    }
}

/// Computes the wait before the next overload retry:
/// `base * (1 + unit_random * growth^retried_times)`.
///
/// `retried_times` is the number of overload retries already consumed.
/// Randomness is a parameter so the formula stays testable; callers pass a
/// uniform sample from `[0, 1)`.
pub fn backoff_delay(config: &BackoffConfig, retried_times: i32, unit_random: f64) -> Duration {
    if retried_times < 0 {
        return config.base;
    }
    let rate = 1.0 + unit_random.clamp(0.0, 1.0) * config.growth.powi(retried_times);
    config.base.mul_f64(rate)
}

/// How much transport-retry budget each overload attempt gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportBudget {
    /// `retry_times - attempts_so_far`, matching the source behavior of
    /// trading transport resilience for overload resilience.
    Shrinking,
    /// A fixed budget per attempt, keeping the two budgets independent.
    Fixed(i32),
}

/// Executes a call through [`RetryExecutor`], retrying on server overload
/// with backoff in between.
#[derive(Debug, Clone)]
pub struct OverloadAwareExecutor {
    retry: RetryExecutor,
    backoff: BackoffConfig,
    transport_budget: TransportBudget,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Default for OverloadAwareExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl OverloadAwareExecutor {
    pub fn new() -> Self {
        Self {
            retry: RetryExecutor::new(),
            backoff: BackoffConfig::default(),
            transport_budget: TransportBudget::Shrinking,
            shutdown: None,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_transport_budget(mut self, budget: TransportBudget) -> Self {
        self.transport_budget = budget;
        self
    }

    /// Wires a shutdown channel; a `true` signal aborts any in-progress
    /// backoff sleep with [`Error::Interrupted`].
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// The inner transport-retry executor.
    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    /// Runs `call` up to `retry_times + 1` times, sleeping a jittered
    /// backoff interval after each overloaded response. Any non-overload
    /// response, success or failure, is returned as-is on the attempt that
    /// produced it. Negative budgets are clamped to zero.
    pub async fn execute_with_overload_handling<Req, Rsp, F, Fut>(
        &self,
        call: F,
        req: Req,
        effects: &[CallOption],
        retry_times: i32,
    ) -> Result<Rsp>
    where
        Req: Clone,
        Rsp: HasStatus,
        F: Fn(Req, CallOptions) -> Fut,
        Fut: Future<Output = std::result::Result<Rsp, NetworkError>>,
    {
        let try_times = retry_times.max(0) + 1;
        for i in 0..try_times {
            let sub_budget = match self.transport_budget {
                TransportBudget::Shrinking => retry_times - i,
                TransportBudget::Fixed(n) => n,
            };
            let rsp = self
                .retry
                .execute(&call, req.clone(), effects, sub_budget)
                .await?;
            if !is_server_overload(rsp.status()) {
                return Ok(rsp);
            }
            if i == try_times - 1 {
                break;
            }
            let delay = backoff_delay(&self.backoff, i, rand::thread_rng().gen::<f64>());
            info!(
                "server overloaded, waiting {:?} before overload retry {}",
                delay,
                i + 1
            );
            sleep_interruptible(delay, self.shutdown.as_ref()).await?;
        }
        warn!(
            "server overloaded on every attempt, giving up after {}",
            try_times
        );
        Err(Error::OverloadExhausted {
            attempts: try_times as u32,
        })
    }
}
