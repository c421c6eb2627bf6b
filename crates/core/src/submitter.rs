//! Fire-and-forget submission with bounded concurrency.
//!
//! A fixed pool of worker tasks drains a bounded queue. When the queue is
//! full the submitting task runs the work itself, so total concurrency is
//! capped and nothing is ever dropped. Failures are logged, not returned;
//! the wrapped calls already carry their own retry and backoff guarantees,
//! and a caller submitting here has opted out of synchronous error handling.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::options::{CallOption, CallOptions};
use crate::overload::OverloadAwareExecutor;
use crate::poller::{OperationPoller, PollConfig};
use crate::retry::RetryExecutor;
use crate::status::{is_success, is_upload_success};
use crate::transport::{HasStatus, NetworkError, OperationFetcher, OperationResponse};

/// Pool sizing and retry budget for submitted calls.
#[derive(Debug, Clone, Copy)]
pub struct SubmitterConfig {
    pub pool_size: usize,
    pub queue_capacity: usize,
    /// Retry budget applied to each submitted call.
    pub retry_times: i32,
    /// Polling knobs for submitted imports.
    pub poll: PollConfig,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            pool_size: 5,
            queue_capacity: 20,
            retry_times: 2,
            poll: PollConfig::default(),
        }
    }
}

/// Which call path a submitted task runs. The pool never branches on this
/// beyond logging; each task carries its own execution future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Write,
    Import,
    Done,
    Callback,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Write => "write",
            TaskKind::Import => "import",
            TaskKind::Done => "done",
            TaskKind::Callback => "callback",
        }
    }
}

struct Task {
    kind: TaskKind,
    fut: BoxFuture<'static, ()>,
}

/// Bounded worker pool for fire-and-forget call submission.
pub struct ConcurrentSubmitter {
    tx: mpsc::Sender<Task>,
    workers: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    retry: RetryExecutor,
    overload: OverloadAwareExecutor,
    config: SubmitterConfig,
}

impl ConcurrentSubmitter {
    pub fn new(config: SubmitterConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, rx) = mpsc::channel::<Task>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..config.pool_size.max(1))
            .map(|id| tokio::spawn(worker_loop(id, Arc::clone(&rx))))
            .collect();
        Self {
            tx,
            workers,
            shutdown_tx,
            retry: RetryExecutor::new(),
            overload: OverloadAwareExecutor::new().with_shutdown(shutdown_rx.clone()),
            shutdown_rx,
            config,
        }
    }

    /// Submits a write-style upload call.
    pub async fn submit_write<Req, Rsp, F, Fut>(&self, call: F, req: Req, effects: Vec<CallOption>)
    where
        Req: Clone + Send + Sync + 'static,
        Rsp: HasStatus + Send + 'static,
        F: Fn(Req, CallOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Rsp, NetworkError>> + Send + 'static,
    {
        self.submit_with_retry(TaskKind::Write, call, req, effects)
            .await;
    }

    /// Submits an offline-sync done marker call.
    pub async fn submit_done<Req, Rsp, F, Fut>(&self, call: F, req: Req, effects: Vec<CallOption>)
    where
        Req: Clone + Send + Sync + 'static,
        Rsp: HasStatus + Send + 'static,
        F: Fn(Req, CallOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Rsp, NetworkError>> + Send + 'static,
    {
        self.submit_with_retry(TaskKind::Done, call, req, effects)
            .await;
    }

    /// Submits an impression-callback call.
    pub async fn submit_callback<Req, Rsp, F, Fut>(
        &self,
        call: F,
        req: Req,
        effects: Vec<CallOption>,
    ) where
        Req: Clone + Send + Sync + 'static,
        Rsp: HasStatus + Send + 'static,
        F: Fn(Req, CallOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Rsp, NetworkError>> + Send + 'static,
    {
        self.submit_with_retry(TaskKind::Callback, call, req, effects)
            .await;
    }

    /// Submits an import call: overload-aware submission, then polling the
    /// accepted operation to completion.
    pub async fn submit_import<Req, Rsp, C, F, Fut>(
        &self,
        call: F,
        req: Req,
        effects: Vec<CallOption>,
        fetcher: Arc<C>,
    ) where
        Req: Clone + Send + Sync + 'static,
        Rsp: HasStatus + DeserializeOwned + Send + 'static,
        C: OperationFetcher + 'static,
        F: Fn(Req, CallOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<OperationResponse, NetworkError>>
            + Send
            + 'static,
    {
        let overload = self.overload.clone();
        let poller = OperationPoller::new(fetcher)
            .with_config(self.config.poll)
            .with_shutdown(self.shutdown_rx.clone());
        let retry_times = self.config.retry_times;
        let fut = async move {
            let accept = match overload
                .execute_with_overload_handling(&call, req, &effects, retry_times)
                .await
            {
                Ok(accept) => accept,
                Err(err) => {
                    error!("async import error: {}", err);
                    return;
                }
            };
            match poller.poll_import::<Rsp>(accept).await {
                Ok(rsp) if is_success(rsp.status()) => info!("async import succeeded"),
                Ok(rsp) => error!(
                    "async import finished with status {}: {}",
                    rsp.status().code,
                    rsp.status().message
                ),
                Err(err) => error!("async import error: {}", err),
            }
        };
        self.enqueue(Task {
            kind: TaskKind::Import,
            fut: Box::pin(fut),
        })
        .await;
    }

    /// Submits an arbitrary prepared task under the given kind tag.
    pub async fn submit<F>(&self, kind: TaskKind, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.enqueue(Task {
            kind,
            fut: Box::pin(fut),
        })
        .await;
    }

    async fn submit_with_retry<Req, Rsp, F, Fut>(
        &self,
        kind: TaskKind,
        call: F,
        req: Req,
        effects: Vec<CallOption>,
    ) where
        Req: Clone + Send + Sync + 'static,
        Rsp: HasStatus + Send + 'static,
        F: Fn(Req, CallOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Rsp, NetworkError>> + Send + 'static,
    {
        let retry = self.retry;
        let retry_times = self.config.retry_times;
        let fut = async move {
            match retry.execute(call, req, &effects, retry_times).await {
                Ok(rsp) => {
                    let accepted = match kind {
                        // Idempotent rejects mean the upload already landed.
                        TaskKind::Write => is_upload_success(rsp.status()),
                        _ => is_success(rsp.status()),
                    };
                    if accepted {
                        info!("async {} succeeded", kind.label());
                    } else {
                        error!(
                            "async {} failed with status {}: {}",
                            kind.label(),
                            rsp.status().code,
                            rsp.status().message
                        );
                    }
                }
                Err(err) => error!("async {} error: {}", kind.label(), err),
            }
        };
        self.enqueue(Task {
            kind,
            fut: Box::pin(fut),
        })
        .await;
    }

    /// Enqueues a task, or runs it on the submitting task when the queue is
    /// saturated. Nothing is ever dropped.
    async fn enqueue(&self, task: Task) {
        match self.tx.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(task)) => {
                debug!(
                    "submit queue full, running {} task on the submitting task",
                    task.kind.label()
                );
                task.fut.await;
            }
            Err(TrySendError::Closed(task)) => {
                warn!(
                    "submitter already shut down, running {} task inline",
                    task.kind.label()
                );
                task.fut.await;
            }
        }
    }

    /// Closes the queue, lets the workers drain what is already queued, and
    /// joins them.
    pub async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            let _ = worker.await;
        }
        info!("concurrent submitter shut down");
    }

    /// Signals in-flight backoff and poll sleeps to abort, then closes the
    /// queue and joins the workers.
    pub async fn shutdown_now(self) {
        let _ = self.shutdown_tx.send(true);
        drop(self.tx);
        for worker in self.workers {
            let _ = worker.await;
        }
        info!("concurrent submitter shut down (immediate)");
    }
}

async fn worker_loop(id: usize, rx: Arc<Mutex<mpsc::Receiver<Task>>>) {
    loop {
        let task = { rx.lock().await.recv().await };
        match task {
            Some(task) => {
                debug!("worker {} running {} task", id, task.kind.label());
                task.fut.await;
            }
            None => break,
        }
    }
    debug!("submit worker {} exiting", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use crate::transport::{OperationHandle, TypedPayload};
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    struct TestResponse {
        status: Status,
    }

    impl HasStatus for TestResponse {
        fn status(&self) -> &Status {
            &self.status
        }
    }

    #[tokio::test]
    async fn burst_of_submissions_all_complete() {
        let submitter = ConcurrentSubmitter::new(SubmitterConfig {
            pool_size: 2,
            queue_capacity: 3,
            ..SubmitterConfig::default()
        });
        let completed = Arc::new(AtomicU32::new(0));
        for _ in 0..20 {
            let completed = completed.clone();
            submitter
                .submit(TaskKind::Write, async move {
                    completed.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }
        submitter.shutdown().await;
        assert_eq!(completed.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn saturated_queue_runs_tasks_on_the_submitter() {
        let submitter = ConcurrentSubmitter::new(SubmitterConfig {
            pool_size: 1,
            queue_capacity: 1,
            ..SubmitterConfig::default()
        });
        let completed = Arc::new(AtomicU32::new(0));
        let started = Arc::new(Semaphore::new(0));
        let release = Arc::new(Semaphore::new(0));

        // Occupy the only worker.
        {
            let completed = completed.clone();
            let started = started.clone();
            let release = release.clone();
            submitter
                .submit(TaskKind::Write, async move {
                    started.add_permits(1);
                    let _permit = release.acquire().await.unwrap();
                    completed.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }
        started.acquire().await.unwrap().forget();

        // Fill the single queue slot.
        {
            let completed = completed.clone();
            submitter
                .submit(TaskKind::Write, async move {
                    completed.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }

        // Queue is full now: these run inline before submit returns.
        for _ in 0..2 {
            let completed = completed.clone();
            submitter
                .submit(TaskKind::Write, async move {
                    completed.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }
        assert_eq!(completed.load(Ordering::SeqCst), 2);

        release.add_permits(1);
        submitter.shutdown().await;
        assert_eq!(completed.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn submitted_write_runs_with_retry() {
        let submitter = ConcurrentSubmitter::new(SubmitterConfig::default());
        let attempts = Arc::new(AtomicU32::new(0));
        let call = {
            let attempts = attempts.clone();
            move |_req: u32, _options: CallOptions| {
                let attempts = attempts.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(NetworkError::new("connection reset"))
                    } else {
                        Ok(TestResponse {
                            status: Status::success(),
                        })
                    }
                }
            }
        };
        submitter.submit_write(call, 7, Vec::new()).await;
        submitter.shutdown().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[derive(Debug, Deserialize)]
    struct ImportResult {
        status: Status,
    }

    impl HasStatus for ImportResult {
        fn status(&self) -> &Status {
            &self.status
        }
    }

    struct DoneFetcher {
        fetches: AtomicU32,
    }

    #[async_trait]
    impl OperationFetcher for DoneFetcher {
        async fn get_operation(
            &self,
            name: &str,
            _options: CallOptions,
        ) -> std::result::Result<OperationResponse, NetworkError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(OperationResponse {
                status: Status::success(),
                operation: Some(OperationHandle {
                    name: name.into(),
                    done: true,
                    response: Some(TypedPayload::new(
                        "type.recsync/ImportResult",
                        json!({ "status": { "code": 0, "message": "" } }),
                    )),
                }),
            })
        }
    }

    struct NeverDoneFetcher;

    #[async_trait]
    impl OperationFetcher for NeverDoneFetcher {
        async fn get_operation(
            &self,
            name: &str,
            _options: CallOptions,
        ) -> std::result::Result<OperationResponse, NetworkError> {
            Ok(OperationResponse {
                status: Status::success(),
                operation: Some(OperationHandle {
                    name: name.into(),
                    done: false,
                    response: None,
                }),
            })
        }
    }

    #[tokio::test]
    async fn shutdown_now_interrupts_inflight_polling() {
        let submitter = ConcurrentSubmitter::new(SubmitterConfig {
            poll: PollConfig {
                polling_timeout: Duration::from_secs(300),
                poll_interval: Duration::from_secs(60),
                ..PollConfig::default()
            },
            ..SubmitterConfig::default()
        });
        let call = |_req: u32, _options: CallOptions| async {
            Ok(OperationResponse {
                status: Status::success(),
                operation: Some(OperationHandle {
                    name: "ops/import-stuck".into(),
                    done: false,
                    response: None,
                }),
            })
        };
        submitter
            .submit_import::<_, ImportResult, _, _, _>(
                call,
                7,
                Vec::new(),
                Arc::new(NeverDoneFetcher),
            )
            .await;
        // The poll sleep is 60s; the shutdown signal has to cut it short.
        tokio::time::timeout(Duration::from_secs(5), submitter.shutdown_now())
            .await
            .expect("shutdown blocked on an uninterrupted sleep");
    }

    #[tokio::test]
    async fn submitted_import_polls_to_completion() {
        let submitter = ConcurrentSubmitter::new(SubmitterConfig::default());
        let fetcher = Arc::new(DoneFetcher {
            fetches: AtomicU32::new(0),
        });
        let call = |_req: u32, _options: CallOptions| async {
            Ok(OperationResponse {
                status: Status::success(),
                operation: Some(OperationHandle {
                    name: "ops/import-1".into(),
                    done: false,
                    response: None,
                }),
            })
        };
        submitter
            .submit_import::<_, ImportResult, _, _, _>(call, 7, Vec::new(), fetcher.clone())
            .await;
        submitter.shutdown().await;
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
    }
}
