use crawlbox::api::{self, state::AppState};
use crawlbox::config::Config;
use crawlbox::fetch::{CachedFetcher, HttpClient, HttpConfig, ResponseCache};
use crawlbox::jobs::{Job, JobContext, JobRegistry, envelope};
use crawlbox::messaging::MessageProducer;
use crawlbox::observability::Metrics;
use crawlbox::queue::{Broker, FjallQueue, RequeuePolicy};
use crawlbox::store::CrawlStore;
use crawlbox::worker::{Dispatcher, PoolSettings, WorkerPool};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn open_broker(config: &Config) -> Result<Arc<Broker>, AnyError> {
    let queue = Arc::new(FjallQueue::open(&config.queue.path)?);
    Ok(Arc::new(Broker::new(queue, RequeuePolicy::from(&config.queue))))
}

/// Run the worker pool and the HTTP surface until a shutdown signal arrives
pub async fn run_fetcher(config: Config) -> Result<(), AnyError> {
    let broker = open_broker(&config)?;
    let store = CrawlStore::open(&config.store.path)?;

    let cache = if config.cache.enabled {
        Some(ResponseCache::local(&config.cache.dir)?)
    } else {
        None
    };
    let transport = Arc::new(HttpClient::new(HttpConfig::from(&config.http))?);
    let fetcher = CachedFetcher::new(transport, cache);

    let metrics = Arc::new(Metrics::new());
    let cancel = CancellationToken::new();
    let registry = Arc::new(JobRegistry::with_defaults());

    let ctx = JobContext::new(fetcher, config.http.base_url.clone())
        .with_cancel(cancel.clone())
        .with_metrics(metrics.clone());
    let producer: Arc<dyn MessageProducer> = broker.clone();
    let dispatcher = Dispatcher::new(
        registry.clone(),
        store,
        producer.clone(),
        ctx,
        config.queue.topic.clone(),
    );
    let pool = WorkerPool::new(
        broker.clone(),
        dispatcher,
        PoolSettings::from(&config),
        cancel.clone(),
    );

    info!(
        concurrency = config.worker.concurrency,
        topic = %config.queue.topic,
        cache = config.cache.enabled,
        "Starting fetcher"
    );

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let pool_handle = tokio::spawn(pool.run());

    let state = AppState::new(registry, producer, metrics, config.queue.topic.clone())
        .with_queue(broker.queue().clone());
    let served = api::serve(config.server.bind_addr, state, cancel.clone()).await;
    if let Err(e) = &served {
        error!(error = %e, "HTTP surface stopped");
    }

    // The pool stops on the same token whether the API exited cleanly or not
    cancel.cancel();
    pool_handle.await??;
    served?;

    info!("Fetcher stopped");
    Ok(())
}

/// Write jobs straight into the local queue
///
/// The queue directory is locked by a running fetcher; use `POST /jobs`
/// against it instead.
pub async fn enqueue(config: &Config, mut jobs: Vec<Job>) -> Result<(), AnyError> {
    let broker = open_broker(config)?;
    let topic = config.queue.topic.as_str();
    let count = jobs.len();

    match count {
        0 => {}
        1 => {
            if let Some(job) = jobs.pop() {
                broker.publish(topic, envelope::encode(&job)?).await?;
            }
        }
        _ => {
            broker.publish_many(topic, envelope::encode_all(&jobs)?).await?;
        }
    }
    broker.flush()?;

    info!(count, topic, "Jobs enqueued");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
