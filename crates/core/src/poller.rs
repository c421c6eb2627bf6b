//! Polling for asynchronous import operations.
//!
//! An accepted import call hands back an operation name; the server works on
//! the task in the background and the client polls `get_operation` until the
//! task finishes, the server reports the operation lost, or the polling
//! deadline expires. Transport trouble on a single poll is suppressed, the
//! loop just polls again after the normal interval.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::errors::{Error, Result};
use crate::options::CallOption;
use crate::retry::RetryExecutor;
use crate::status::{is_loss_operation, is_upload_success, Status};
use crate::transport::{OperationFetcher, OperationResponse, TypedPayload};
use crate::utils::sleep_interruptible;

/// Timing knobs for the polling loop. Defaults match the upstream service
/// guidance: a 10s overall deadline, 100ms between polls, and a 600ms
/// per-fetch timeout so one slow poll cannot eat the whole deadline.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Wall-clock deadline for the whole polling loop.
    pub polling_timeout: Duration,
    /// Pause between polls.
    pub poll_interval: Duration,
    /// Per-call timeout handed to each `get_operation` fetch.
    pub get_operation_timeout: Duration,
    /// Transport-retry budget for each individual fetch.
    pub fetch_retry_times: i32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            polling_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            get_operation_timeout: Duration::from_millis(600),
            fetch_retry_times: 1,
        }
    }
}

/// Drives a server-side operation to its final typed result.
#[derive(Debug, Clone)]
pub struct OperationPoller<C> {
    fetcher: Arc<C>,
    retry: RetryExecutor,
    config: PollConfig,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<C: OperationFetcher> OperationPoller<C> {
    pub fn new(fetcher: Arc<C>) -> Self {
        Self {
            fetcher,
            retry: RetryExecutor::new(),
            config: PollConfig::default(),
            shutdown: None,
        }
    }

    pub fn with_config(mut self, config: PollConfig) -> Self {
        self.config = config;
        self
    }

    /// Wires a shutdown channel; a `true` signal aborts any in-progress
    /// poll-interval sleep with [`Error::Interrupted`].
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Takes the accept response of an import call and polls the operation
    /// it names until done, decoding the final payload into `T`.
    ///
    /// An idempotent reject on the accept response counts as acceptance,
    /// the server already holds the data. Any other non-success status is
    /// surfaced immediately without polling.
    pub async fn poll_import<T: DeserializeOwned>(&self, accept: OperationResponse) -> Result<T> {
        if !is_upload_success(&accept.status) {
            error!(
                "import rejected by server (code {}): {}",
                accept.status.code, accept.status.message
            );
            return Err(Error::Rejected(accept.status));
        }
        let operation = accept.operation.ok_or_else(|| {
            Error::Rejected(Status::new(
                accept.status.code,
                "accepted import response carried no operation handle",
            ))
        })?;
        let payload = self.poll_until_done(&operation.name).await?;
        payload.decode().map_err(Error::Decode)
    }

    /// Polls `get_operation` until the task reports done, bounded by the
    /// wall-clock deadline. Only an explicit operation-loss status or the
    /// deadline ends the loop early; a failed fetch is suppressed.
    async fn poll_until_done(&self, name: &str) -> Result<TypedPayload> {
        let deadline = Instant::now() + self.config.polling_timeout;
        while Instant::now() < deadline {
            let rsp = match self.fetch_operation(name).await {
                Ok(rsp) => rsp,
                Err(Error::Interrupted) => return Err(Error::Interrupted),
                Err(err) => {
                    debug!("operation fetch failed, polling again: {}", err);
                    sleep_interruptible(self.config.poll_interval, self.shutdown.as_ref())
                        .await?;
                    continue;
                }
            };
            // The server dropped the task's bookkeeping. Polling further
            // would imply progress is still tracked, so bail out and let
            // the caller reconcile out of band.
            if is_loss_operation(&rsp.status) {
                error!("operation {} lost by server: {}", name, rsp.status.message);
                return Err(Error::OperationLost {
                    name: name.to_string(),
                    message: rsp.status.message,
                });
            }
            if let Some(operation) = rsp.operation {
                if operation.done {
                    return Ok(operation.response.unwrap_or_else(TypedPayload::empty));
                }
            }
            sleep_interruptible(self.config.poll_interval, self.shutdown.as_ref()).await?;
        }
        error!(
            "polling operation {} timed out after {:?}",
            name, self.config.polling_timeout
        );
        Err(Error::PollingTimeout {
            waited: self.config.polling_timeout,
        })
    }

    async fn fetch_operation(&self, name: &str) -> Result<OperationResponse> {
        let effects = [CallOption::Timeout(self.config.get_operation_timeout)];
        let fetcher = &self.fetcher;
        self.retry
            .execute(
                |req: String, options| async move { fetcher.get_operation(&req, options).await },
                name.to_string(),
                &effects,
                self.config.fetch_retry_times,
            )
            .await
    }
}
