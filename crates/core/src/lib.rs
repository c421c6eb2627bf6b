//! Recsync Core - resilient request execution for a remote data API.
//!
//! Turns a raw, possibly-failing network call into a reliable operation:
//! idempotent transport retry, overload-aware backoff, bounded polling for
//! asynchronous import operations, and a bounded worker pool for
//! fire-and-forget submission. The crate owns no transport of its own;
//! callers hand it async call closures and a [`transport::OperationFetcher`].

pub mod errors;
pub mod options;
pub mod overload;
pub mod poller;
pub mod retry;
pub mod status;
pub mod submitter;
pub mod transport;
pub(crate) mod utils;

pub use errors::{Error, Result};
pub use options::{CallOption, CallOptions, SyncStage};
pub use overload::{backoff_delay, BackoffConfig, OverloadAwareExecutor, TransportBudget};
pub use poller::{OperationPoller, PollConfig};
pub use retry::RetryExecutor;
pub use status::{
    classify, is_loss_operation, is_server_overload, is_success, is_upload_success, Outcome,
    Status,
};
pub use submitter::{ConcurrentSubmitter, SubmitterConfig, TaskKind};
pub use transport::{
    HasStatus, NetworkError, OperationFetcher, OperationHandle, OperationResponse, TypedPayload,
};
