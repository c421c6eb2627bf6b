//! Error types for the recsync core crate.

use std::time::Duration;

use thiserror::Error;

use crate::status::Status;
use crate::transport::NetworkError;

/// Result type alias for recsync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the request-execution and operation-polling engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure that was not retried.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Every transport retry attempt failed.
    #[error("request failed after {attempts} attempts: {source}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        source: NetworkError,
    },

    /// Every attempt was rejected by the server for overload.
    #[error("server overloaded, gave up after {attempts} attempts")]
    OverloadExhausted { attempts: u32 },

    /// The server returned a non-retryable failure status.
    #[error("request rejected by server (code {}): {}", .0.code, .0.message)]
    Rejected(Status),

    /// The server lost the bookkeeping for an asynchronous task. Never
    /// retried; the caller has to reconcile out of band.
    #[error("operation {name} lost by server: {message}")]
    OperationLost { name: String, message: String },

    /// The polling deadline expired before the operation finished.
    #[error("polling operation result timed out after {waited:?}")]
    PollingTimeout { waited: Duration },

    /// The completed operation carried a payload that does not decode into
    /// the expected response type.
    #[error("failed to decode operation payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// A shutdown signal arrived while the call was sleeping between
    /// attempts or polls.
    #[error("interrupted by shutdown")]
    Interrupted,
}
