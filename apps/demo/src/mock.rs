//! Mock data API for exercising the engine end to end.
//!
//! Simulates the remote side: small call latencies, a configurable chance
//! of overload rejection, and an in-memory operation table whose imports
//! finish after a few polls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;

use recsync_core::{
    CallOptions, HasStatus, NetworkError, OperationFetcher, OperationHandle, OperationResponse,
    Status, TypedPayload,
};

/// One row of mock behavior data, schema-free the way the write endpoint
/// accepts it.
pub type DataRow = serde_json::Map<String, serde_json::Value>;

pub fn mock_data_list(count: usize) -> Vec<DataRow> {
    (0..count).map(|i| mock_data_row(i as u64)).collect()
}

fn mock_data_row(seq: u64) -> DataRow {
    let row = json!({
        "user_id": format!("user-{}", 1_457_000 + seq),
        "event_type": "purchase",
        "event_timestamp": 1_623_681_767 + seq,
        "product_id": format!("product-{}", 632_000 + seq),
        "device_platform": "android",
        "device_os_version": "10",
        "device_network": "wifi",
        "traffic_source": "self",
        "purchase_count": 1 + seq % 5,
    });
    match row {
        serde_json::Value::Object(map) => map,
        _ => DataRow::new(),
    }
}

#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub topic: String,
    pub rows: Vec<DataRow>,
}

#[derive(Debug, Clone)]
pub struct DoneRequest {
    pub topic: String,
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct CallbackRequest {
    pub predict_request_id: String,
    pub product_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteResponse {
    pub status: Status,
}

impl HasStatus for WriteResponse {
    fn status(&self) -> &Status {
        &self.status
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackResponse {
    pub status: Status,
}

impl HasStatus for CallbackResponse {
    fn status(&self) -> &Status {
        &self.status
    }
}

/// Final result decoded from a completed import operation.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportResult {
    pub status: Status,
    pub imported: u64,
}

impl HasStatus for ImportResult {
    fn status(&self) -> &Status {
        &self.status
    }
}

#[derive(Debug)]
struct PendingOperation {
    remaining_polls: u32,
    row_count: u64,
}

/// In-memory stand-in for the remote data API.
pub struct MockApi {
    overload_probability: f64,
    operations: Mutex<HashMap<String, PendingOperation>>,
    op_seq: AtomicU64,
}

impl MockApi {
    pub fn new(overload_probability: f64) -> Self {
        Self {
            overload_probability: overload_probability.clamp(0.0, 1.0),
            operations: Mutex::new(HashMap::new()),
            op_seq: AtomicU64::new(0),
        }
    }

    fn maybe_overloaded(&self) -> Option<Status> {
        if rand::thread_rng().gen::<f64>() < self.overload_probability {
            Some(Status::new(429, "too many requests"))
        } else {
            None
        }
    }

    pub async fn write_data(
        &self,
        req: WriteRequest,
        options: CallOptions,
    ) -> Result<WriteResponse, NetworkError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if let Some(status) = self.maybe_overloaded() {
            return Ok(WriteResponse { status });
        }
        debug!(
            "mock write: topic={} rows={} request_id={:?}",
            req.topic,
            req.rows.len(),
            options.request_id
        );
        Ok(WriteResponse {
            status: Status::success(),
        })
    }

    /// Accepts an offline import and parks it in the operation table; it
    /// reports done after a few polls.
    pub async fn import_data(
        &self,
        req: WriteRequest,
        options: CallOptions,
    ) -> Result<OperationResponse, NetworkError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if let Some(status) = self.maybe_overloaded() {
            return Ok(OperationResponse {
                status,
                operation: None,
            });
        }
        let name = format!(
            "operations/import/{}",
            self.op_seq.fetch_add(1, Ordering::SeqCst)
        );
        self.operations.lock().unwrap().insert(
            name.clone(),
            PendingOperation {
                remaining_polls: 3,
                row_count: req.rows.len() as u64,
            },
        );
        debug!(
            "mock import accepted: topic={} operation={} data_date={:?}",
            req.topic, name, options.data_date
        );
        Ok(OperationResponse {
            status: Status::success(),
            operation: Some(OperationHandle {
                name,
                done: false,
                response: None,
            }),
        })
    }

    pub async fn done(
        &self,
        req: DoneRequest,
        options: CallOptions,
    ) -> Result<WriteResponse, NetworkError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if let Some(status) = self.maybe_overloaded() {
            return Ok(WriteResponse { status });
        }
        debug!(
            "mock done: topic={} dates={:?} stage={:?}",
            req.topic, req.dates, options.stage
        );
        Ok(WriteResponse {
            status: Status::success(),
        })
    }

    pub async fn callback(
        &self,
        req: CallbackRequest,
        options: CallOptions,
    ) -> Result<CallbackResponse, NetworkError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if let Some(status) = self.maybe_overloaded() {
            return Ok(CallbackResponse { status });
        }
        debug!(
            "mock callback: predict_request_id={} items={} request_id={:?}",
            req.predict_request_id,
            req.product_ids.len(),
            options.request_id
        );
        Ok(CallbackResponse {
            status: Status::success(),
        })
    }
}

#[async_trait]
impl OperationFetcher for MockApi {
    async fn get_operation(
        &self,
        name: &str,
        _options: CallOptions,
    ) -> Result<OperationResponse, NetworkError> {
        tokio::time::sleep(Duration::from_millis(2)).await;
        let mut operations = self.operations.lock().unwrap();
        let Some(pending) = operations.get_mut(name) else {
            return Ok(OperationResponse {
                status: Status::new(410, "operation record not found"),
                operation: None,
            });
        };
        if pending.remaining_polls > 0 {
            pending.remaining_polls -= 1;
            return Ok(OperationResponse {
                status: Status::success(),
                operation: Some(OperationHandle {
                    name: name.to_string(),
                    done: false,
                    response: None,
                }),
            });
        }
        let row_count = pending.row_count;
        operations.remove(name);
        Ok(OperationResponse {
            status: Status::success(),
            operation: Some(OperationHandle {
                name: name.to_string(),
                done: true,
                response: Some(TypedPayload::new(
                    "type.recsync/ImportResult",
                    json!({
                        "status": { "code": 0, "message": "" },
                        "imported": row_count,
                    }),
                )),
            }),
        })
    }
}
