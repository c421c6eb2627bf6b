//! Response status model and outcome classification.
//!
//! Every response the engine handles carries a [`Status`]. The classifier
//! maps its code onto the closed set of outcomes the executors act on; the
//! predicate helpers mirror the status checks callers use for logging and
//! acceptance decisions.

use serde::{Deserialize, Serialize};

/// The call succeeded.
pub const STATUS_CODE_SUCCESS: i32 = 0;

/// The server already saw this request id and deduplicated the delivery.
pub const STATUS_CODE_IDEMPOTENT: i32 = 409;

/// The server no longer tracks the asynchronous task behind an operation.
pub const STATUS_CODE_OPERATION_LOSS: i32 = 410;

/// The server rejected the call because it is overloaded.
pub const STATUS_CODE_TOO_MANY_REQUEST: i32 = 429;

/// Status attached to every server response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl Status {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn success() -> Self {
        Self::new(STATUS_CODE_SUCCESS, "")
    }
}

/// Closed set of outcomes a status code maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    IdempotentReject,
    Overloaded,
    OperationLost,
    OtherFailure,
}

/// Maps a status onto its [`Outcome`]. Pure, no state.
pub fn classify(status: &Status) -> Outcome {
    match status.code {
        STATUS_CODE_SUCCESS => Outcome::Success,
        STATUS_CODE_IDEMPOTENT => Outcome::IdempotentReject,
        STATUS_CODE_TOO_MANY_REQUEST => Outcome::Overloaded,
        STATUS_CODE_OPERATION_LOSS => Outcome::OperationLost,
        _ => Outcome::OtherFailure,
    }
}

/// An idempotent reject means the data already reached the server, which
/// still counts as success for upload-type calls.
pub fn is_upload_success(status: &Status) -> bool {
    matches!(
        classify(status),
        Outcome::Success | Outcome::IdempotentReject
    )
}

pub fn is_success(status: &Status) -> bool {
    classify(status) == Outcome::Success
}

pub fn is_server_overload(status: &Status) -> bool {
    classify(status) == Outcome::Overloaded
}

pub fn is_loss_operation(status: &Status) -> bool {
    classify(status) == Outcome::OperationLost
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognized_codes() {
        assert_eq!(classify(&Status::new(0, "")), Outcome::Success);
        assert_eq!(classify(&Status::new(409, "")), Outcome::IdempotentReject);
        assert_eq!(classify(&Status::new(429, "")), Outcome::Overloaded);
        assert_eq!(classify(&Status::new(410, "")), Outcome::OperationLost);
    }

    #[test]
    fn classify_unknown_codes_as_other_failure() {
        assert_eq!(classify(&Status::new(500, "boom")), Outcome::OtherFailure);
        assert_eq!(classify(&Status::new(-1, "")), Outcome::OtherFailure);
        assert_eq!(classify(&Status::new(1, "")), Outcome::OtherFailure);
    }

    #[test]
    fn idempotent_reject_counts_as_upload_success() {
        assert!(is_upload_success(&Status::new(STATUS_CODE_SUCCESS, "")));
        assert!(is_upload_success(&Status::new(STATUS_CODE_IDEMPOTENT, "")));
        assert!(!is_upload_success(&Status::new(
            STATUS_CODE_TOO_MANY_REQUEST,
            ""
        )));
        assert!(!is_success(&Status::new(STATUS_CODE_IDEMPOTENT, "")));
    }

    #[test]
    fn overload_and_loss_predicates() {
        assert!(is_server_overload(&Status::new(429, "slow down")));
        assert!(!is_server_overload(&Status::new(0, "")));
        assert!(is_loss_operation(&Status::new(410, "gone")));
        assert!(!is_loss_operation(&Status::new(429, "")));
    }
}
