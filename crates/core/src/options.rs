//! Per-call configuration options.
//!
//! Callers hand the engine an ordered list of [`CallOption`] effects; the
//! executors merge them into a [`CallOptions`] bag once, before the first
//! attempt, and reuse the merged bag unchanged for every retry. The request
//! id is the one option the engine itself guarantees: exactly one is present
//! on the wire, generated only when the caller did not supply one.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Offline-sync phases the server distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    PreSync,
    HistorySync,
    IncrementalSyncDaily,
    IncrementalSyncStreaming,
}

impl SyncStage {
    /// Wire name of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::PreSync => "pre_sync",
            SyncStage::HistorySync => "history_sync",
            SyncStage::IncrementalSyncDaily => "incremental_sync_daily",
            SyncStage::IncrementalSyncStreaming => "incremental_sync_streaming",
        }
    }
}

/// A single configuration effect. Later effects override earlier ones,
/// except headers, which merge key-wise.
#[derive(Debug, Clone)]
pub enum CallOption {
    /// Dedup key the server uses to recognize redelivery of the same call.
    RequestId(String),
    /// Total budget for one attempt of the call.
    Timeout(Duration),
    /// Processing-time hint forwarded to the callee.
    ServerTimeout(Duration),
    /// Custom headers attached to the call.
    Headers(HashMap<String, String>),
    /// Date the uploaded data belongs to; required for offline-sync calls.
    DataDate(NaiveDate),
    /// Which sync phase this call is part of.
    Stage(SyncStage),
}

/// Merged option bag handed to the transport with each attempt.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub request_id: Option<String>,
    pub timeout: Option<Duration>,
    pub server_timeout: Option<Duration>,
    pub headers: HashMap<String, String>,
    pub data_date: Option<NaiveDate>,
    pub stage: Option<SyncStage>,
}

impl CallOptions {
    /// Merges an ordered list of effects into one bag.
    pub fn from_effects(effects: &[CallOption]) -> Self {
        let mut options = Self::default();
        for effect in effects {
            options.apply(effect.clone());
        }
        options
    }

    fn apply(&mut self, effect: CallOption) {
        match effect {
            CallOption::RequestId(id) => self.request_id = Some(id),
            CallOption::Timeout(timeout) => self.timeout = Some(timeout),
            CallOption::ServerTimeout(timeout) => self.server_timeout = Some(timeout),
            CallOption::Headers(headers) => self.headers.extend(headers),
            CallOption::DataDate(date) => self.data_date = Some(date),
            CallOption::Stage(stage) => self.stage = Some(stage),
        }
    }

    /// Ensures a request id is present, preserving a caller-supplied one.
    ///
    /// Retrying with a fresh id would look like a new request to the server
    /// and could save duplicate data, so the id set here is reused for
    /// every attempt of the logical call.
    pub fn ensure_request_id(&mut self) -> &str {
        if self.request_id.is_none() {
            self.request_id = Some(Uuid::new_v4().to_string());
        }
        self.request_id.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_effects_override_earlier_ones() {
        let options = CallOptions::from_effects(&[
            CallOption::Timeout(Duration::from_millis(800)),
            CallOption::RequestId("first".into()),
            CallOption::RequestId("second".into()),
            CallOption::Timeout(Duration::from_millis(200)),
        ]);
        assert_eq!(options.request_id.as_deref(), Some("second"));
        assert_eq!(options.timeout, Some(Duration::from_millis(200)));
    }

    #[test]
    fn headers_merge_key_wise() {
        let mut first = HashMap::new();
        first.insert("a".to_string(), "1".to_string());
        first.insert("b".to_string(), "1".to_string());
        let mut second = HashMap::new();
        second.insert("b".to_string(), "2".to_string());

        let options = CallOptions::from_effects(&[
            CallOption::Headers(first),
            CallOption::Headers(second),
        ]);
        assert_eq!(options.headers.get("a").map(String::as_str), Some("1"));
        assert_eq!(options.headers.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn ensure_request_id_preserves_caller_id() {
        let mut options =
            CallOptions::from_effects(&[CallOption::RequestId("caller-id".into())]);
        options.ensure_request_id();
        assert_eq!(options.request_id.as_deref(), Some("caller-id"));
    }

    #[test]
    fn ensure_request_id_generates_when_absent() {
        let mut options = CallOptions::default();
        let id = options.ensure_request_id().to_string();
        assert!(!id.is_empty());
        // Stable once generated.
        options.ensure_request_id();
        assert_eq!(options.request_id.as_deref(), Some(id.as_str()));
    }

    #[test]
    fn stage_wire_names() {
        assert_eq!(SyncStage::PreSync.as_str(), "pre_sync");
        assert_eq!(
            SyncStage::IncrementalSyncStreaming.as_str(),
            "incremental_sync_streaming"
        );
    }
}
