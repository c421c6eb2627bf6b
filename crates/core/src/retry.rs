//! Transport-failure retry with a stable idempotency key.
//!
//! A request that dies on the wire (connection reset, timeout) may or may
//! not have reached the server, so it is retried immediately under the same
//! request id; the server deduplicates redelivery. Status-level failures are
//! never retried here, that is the overload executor's concern.

use std::future::Future;

use log::{debug, error};

use crate::errors::{Error, Result};
use crate::options::{CallOption, CallOptions};
use crate::status::is_success;
use crate::transport::{HasStatus, NetworkError};

/// Executes one logical call with bounded retry on transport failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryExecutor;

impl RetryExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Runs `call` up to `retry_times + 1` times, retrying only on
    /// [`NetworkError`]. Negative budgets are clamped to zero (one attempt).
    ///
    /// The option effects are merged once before the first attempt and the
    /// merged bag, request id included, is reused unchanged for every
    /// attempt. The first response returned by the transport ends the loop
    /// regardless of its status code.
    pub async fn execute<Req, Rsp, F, Fut>(
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
        let mut options = CallOptions::from_effects(effects);
        options.ensure_request_id();
        let try_times = retry_times.max(0) as u32 + 1;

        let mut attempt = 0;
        loop {
            match call(req.clone(), options.clone()).await {
                Ok(rsp) => {
                    if is_success(rsp.status()) {
                        debug!("request succeeded on attempt {}", attempt + 1);
                    } else {
                        debug!(
                            "request returned status {} on attempt {}",
                            rsp.status().code,
                            attempt + 1
                        );
                    }
                    return Ok(rsp);
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= try_times {
                        error!("request failed finally after {} attempts: {}", try_times, err);
                        return Err(Error::ExhaustedRetries {
                            attempts: try_times,
                            source: err,
                        });
                    }
                    debug!("transport failure on attempt {}, retrying: {}", attempt, err);
                }
            }
        }
    }
}
