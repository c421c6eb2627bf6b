//! Boundaries the engine consumes: the transport call shape, the
//! operation-fetch interface, and the response envelopes for asynchronous
//! import tasks.
//!
//! The engine never talks to the network itself. Callers provide one async
//! closure per logical endpoint (`Fn(Req, CallOptions) -> Result<Rsp,
//! NetworkError>`); every accepted response type exposes its [`Status`]
//! through [`HasStatus`], resolved at compile time.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::options::CallOptions;
use crate::status::Status;

/// Transport-level failure, distinct from any status the server returns.
#[derive(Debug, Error)]
#[error("network error: {message}")]
pub struct NetworkError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl NetworkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        Self::with_source(err.to_string(), err)
    }
}

/// Compile-time capability: a response type that carries a [`Status`].
pub trait HasStatus {
    fn status(&self) -> &Status;
}

/// Type-tagged serialized value inside a completed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedPayload {
    pub type_url: String,
    pub value: serde_json::Value,
}

impl TypedPayload {
    pub fn new(type_url: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }

    /// Placeholder for a done operation that carried no payload.
    pub fn empty() -> Self {
        Self::new("", serde_json::Value::Null)
    }

    /// Decodes the payload into the caller's response type.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.value)
    }
}

/// Server-side handle for a long-running task. The client only ever polls
/// it; the server is the sole writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationHandle {
    pub name: String,
    pub done: bool,
    pub response: Option<TypedPayload>,
}

/// Envelope returned by import-accept and operation-fetch calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResponse {
    pub status: Status,
    pub operation: Option<OperationHandle>,
}

impl HasStatus for OperationResponse {
    fn status(&self) -> &Status {
        &self.status
    }
}

/// Fetches the latest state of an operation by name.
#[async_trait]
pub trait OperationFetcher: Send + Sync {
    async fn get_operation(
        &self,
        name: &str,
        options: CallOptions,
    ) -> Result<OperationResponse, NetworkError>;
}
