//! Demo binary driving every call path of the recsync engine against a
//! mock data API: retried writes, overload-aware imports with polling,
//! done markers, callbacks, and a fire-and-forget burst through the
//! bounded submitter.

mod config;
mod mock;

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use log::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use recsync_core::{
    is_success, is_upload_success, CallOption, CallOptions, ConcurrentSubmitter, HasStatus,
    OperationPoller, OverloadAwareExecutor, PollConfig, RetryExecutor, SubmitterConfig, SyncStage,
};

use config::Config;
use mock::{
    mock_data_list, CallbackRequest, DoneRequest, ImportResult, MockApi, WriteRequest,
};

const WRITE_TIMEOUT: Duration = Duration::from_millis(800);
const IMPORT_TIMEOUT: Duration = Duration::from_millis(800);
const DONE_TIMEOUT: Duration = Duration::from_millis(800);
const CALLBACK_TIMEOUT: Duration = Duration::from_millis(800);

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(&config.log_format);
    info!("starting recsync demo with {:?}", config);

    let api = Arc::new(MockApi::new(config.overload_probability));

    write_example(&api, &config).await;
    import_example(&api, &config).await;
    done_example(&api, &config).await;
    callback_example(&api, &config).await;
    concurrent_examples(Arc::clone(&api), &config).await;

    Ok(())
}

/// Synchronous write with transport retry.
async fn write_example(api: &Arc<MockApi>, config: &Config) {
    let api_call = Arc::clone(api);
    let call = move |req: WriteRequest, options: CallOptions| {
        let api = Arc::clone(&api_call);
        async move { api.write_data(req, options).await }
    };
    let req = WriteRequest {
        topic: "behavior".into(),
        rows: mock_data_list(2),
    };
    let effects = vec![
        CallOption::Timeout(WRITE_TIMEOUT),
        CallOption::Stage(SyncStage::IncrementalSyncStreaming),
    ];
    match RetryExecutor::new()
        .execute(call, req, &effects, config.retry_times)
        .await
    {
        Ok(rsp) if is_upload_success(rsp.status()) => info!("write data success"),
        Ok(rsp) => error!(
            "write data failed with status {}: {}",
            rsp.status().code,
            rsp.status().message
        ),
        Err(err) => error!("write data error: {}", err),
    }
}

/// Offline import: overload-aware submission, then polling the operation
/// to completion and decoding the final result.
async fn import_example(api: &Arc<MockApi>, config: &Config) {
    let api_call = Arc::clone(api);
    let call = move |req: WriteRequest, options: CallOptions| {
        let api = Arc::clone(&api_call);
        async move { api.import_data(req, options).await }
    };
    let req = WriteRequest {
        topic: "item".into(),
        rows: mock_data_list(10),
    };
    let data_date = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .unwrap_or_default();
    let effects = vec![
        CallOption::Timeout(IMPORT_TIMEOUT),
        CallOption::Stage(SyncStage::PreSync),
        CallOption::DataDate(data_date),
    ];

    let accept = match OverloadAwareExecutor::new()
        .execute_with_overload_handling(call, req, &effects, config.retry_times)
        .await
    {
        Ok(accept) => accept,
        Err(err) => {
            error!("import data error: {}", err);
            return;
        }
    };
    let poller = OperationPoller::new(Arc::clone(api));
    match poller.poll_import::<ImportResult>(accept).await {
        Ok(result) if is_success(result.status()) => {
            info!("import finished, {} rows imported", result.imported)
        }
        Ok(result) => error!(
            "import finished with status {}: {}",
            result.status().code,
            result.status().message
        ),
        Err(err) => error!("import polling error: {}", err),
    }
}

/// Marks yesterday's offline upload as complete.
async fn done_example(api: &Arc<MockApi>, config: &Config) {
    let api_call = Arc::clone(api);
    let call = move |req: DoneRequest, options: CallOptions| {
        let api = Arc::clone(&api_call);
        async move { api.done(req, options).await }
    };
    let date = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .unwrap_or_default();
    let req = DoneRequest {
        topic: "item".into(),
        dates: vec![date],
    };
    let effects = vec![
        CallOption::Timeout(DONE_TIMEOUT),
        CallOption::Stage(SyncStage::PreSync),
    ];
    match RetryExecutor::new()
        .execute(call, req, &effects, config.retry_times)
        .await
    {
        Ok(rsp) if is_success(rsp.status()) => info!("done marker success"),
        Ok(rsp) => error!(
            "done marker failed with status {}: {}",
            rsp.status().code,
            rsp.status().message
        ),
        Err(err) => error!("done marker error: {}", err),
    }
}

/// Reports shown impressions back after a recommendation was served.
async fn callback_example(api: &Arc<MockApi>, config: &Config) {
    let api_call = Arc::clone(api);
    let call = move |req: CallbackRequest, options: CallOptions| {
        let api = Arc::clone(&api_call);
        async move { api.callback(req, options).await }
    };
    let req = CallbackRequest {
        predict_request_id: "predict-demo-1".into(),
        product_ids: vec!["632461".into(), "632462".into()],
    };
    let effects = vec![CallOption::Timeout(CALLBACK_TIMEOUT)];
    match RetryExecutor::new()
        .execute(call, req, &effects, config.retry_times)
        .await
    {
        Ok(rsp) if is_success(rsp.status()) => info!("callback success"),
        Ok(rsp) => error!(
            "callback failed with status {}: {}",
            rsp.status().code,
            rsp.status().message
        ),
        Err(err) => error!("callback error: {}", err),
    }
}

/// Fire-and-forget burst through the bounded submitter: more writes than
/// the queue holds, one import, a done marker, and a callback.
async fn concurrent_examples(api: Arc<MockApi>, config: &Config) {
    let submitter = ConcurrentSubmitter::new(SubmitterConfig {
        pool_size: config.pool_size,
        queue_capacity: config.queue_capacity,
        retry_times: config.retry_times,
        poll: PollConfig::default(),
    });

    for _ in 0..config.write_count {
        let api_call = Arc::clone(&api);
        let call = move |req: WriteRequest, options: CallOptions| {
            let api = Arc::clone(&api_call);
            async move { api.write_data(req, options).await }
        };
        let req = WriteRequest {
            topic: "behavior".into(),
            rows: mock_data_list(3),
        };
        submitter
            .submit_write(call, req, vec![CallOption::Timeout(WRITE_TIMEOUT)])
            .await;
    }

    {
        let api_call = Arc::clone(&api);
        let call = move |req: WriteRequest, options: CallOptions| {
            let api = Arc::clone(&api_call);
            async move { api.import_data(req, options).await }
        };
        let req = WriteRequest {
            topic: "user".into(),
            rows: mock_data_list(20),
        };
        let effects = vec![
            CallOption::Timeout(IMPORT_TIMEOUT),
            CallOption::Stage(SyncStage::HistorySync),
        ];
        submitter
            .submit_import::<_, ImportResult, _, _, _>(call, req, effects, Arc::clone(&api))
            .await;
    }

    {
        let api_call = Arc::clone(&api);
        let call = move |req: DoneRequest, options: CallOptions| {
            let api = Arc::clone(&api_call);
            async move { api.done(req, options).await }
        };
        let date = Utc::now()
            .date_naive()
            .checked_sub_days(Days::new(1))
            .unwrap_or_default();
        let req = DoneRequest {
            topic: "user".into(),
            dates: vec![date],
        };
        submitter
            .submit_done(call, req, vec![CallOption::Timeout(DONE_TIMEOUT)])
            .await;
    }

    {
        let api_call = Arc::clone(&api);
        let call = move |req: CallbackRequest, options: CallOptions| {
            let api = Arc::clone(&api_call);
            async move { api.callback(req, options).await }
        };
        let req = CallbackRequest {
            predict_request_id: "predict-demo-2".into(),
            product_ids: vec!["441356".into()],
        };
        submitter
            .submit_callback(call, req, vec![CallOption::Timeout(CALLBACK_TIMEOUT)])
            .await;
    }

    submitter.shutdown().await;
    info!("all submitted tasks completed");
}
