use bytes::Bytes;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::{Service, ServiceBuilder, ServiceExt};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use super::WorkerError;
use super::dispatch::{DispatchError, Dispatcher, Outcome};
use crate::config::Config;
use crate::observability::Metrics;
use crate::queue::{Broker, Delivery};

/// Pool sizing and shutdown behaviour
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub topic: String,
    pub concurrency: usize,
    pub drain_timeout: Duration,
}

impl From<&Config> for PoolSettings {
    fn from(config: &Config) -> Self {
        Self {
            topic: config.queue.topic.clone(),
            concurrency: config.worker.concurrency,
            drain_timeout: config.worker.drain_timeout.as_duration(),
        }
    }
}

/// Consumes a topic with at most `concurrency` deliveries in flight.
///
/// The cap is enforced by `tower::limit::ConcurrencyLimit`: a delivery is
/// only pulled off the channel once the limiter is ready, and its permit is
/// held by the spawned handler until it completes.
pub struct WorkerPool {
    broker: Arc<Broker>,
    dispatcher: Dispatcher,
    settings: PoolSettings,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(
        broker: Arc<Broker>,
        dispatcher: Dispatcher,
        settings: PoolSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            broker,
            dispatcher,
            settings,
            cancel,
        }
    }

    /// Run until the cancellation token fires or the subscription closes,
    /// then drain in-flight handlers and flush the queue and store
    pub async fn run(self) -> Result<(), WorkerError> {
        let topic = self.settings.topic.clone();
        let mut deliveries = self.broker.subscribe(&topic).await?;
        let metrics = self.dispatcher.metrics().clone();
        let store = self.dispatcher.store().clone();

        let mut service = ServiceBuilder::new()
            .concurrency_limit(self.settings.concurrency)
            .service(self.dispatcher);
        let mut in_flight = JoinSet::new();

        info!(topic = %topic, concurrency = self.settings.concurrency, "Worker pool started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                ready = ServiceExt::<Bytes>::ready(&mut service) => {
                    if let Err(e) = ready {
                        error!(error = %e, "Dispatcher not ready");
                        break;
                    }
                }
            }

            let delivery = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                delivery = deliveries.recv() => match delivery {
                    Some(delivery) => delivery,
                    None => break,
                },
            };

            while let Some(result) = in_flight.try_join_next() {
                log_join_error(result);
            }

            metrics.delivery_received();
            let span = info_span!(
                "delivery",
                topic = %delivery.topic,
                seq = delivery.seq,
                attempts = delivery.attempts,
                trace_id = %Uuid::new_v4(),
            );
            let response = service.call(delivery.body.clone());
            let broker = self.broker.clone();
            let metrics = metrics.clone();

            in_flight.spawn(
                async move {
                    let result = match AssertUnwindSafe(response).catch_unwind().await {
                        Ok(result) => result,
                        Err(panic) => Err(DispatchError::Panicked(panic_message(panic.as_ref()))),
                    };
                    settle(&broker, &metrics, delivery, result).await;
                }
                .instrument(span),
            );
        }

        info!(in_flight = in_flight.len(), "Worker pool stopping, draining");
        self.broker.unsubscribe(&topic).await;

        let drain = async {
            while let Some(result) = in_flight.join_next().await {
                log_join_error(result);
            }
        };
        if tokio::time::timeout(self.settings.drain_timeout, drain).await.is_err() {
            warn!(
                remaining = in_flight.len(),
                "Drain timeout elapsed, aborting remaining handlers; their messages stay queued"
            );
            in_flight.abort_all();
        }

        self.broker.flush()?;
        store.persist()?;
        info!("Worker pool stopped");
        Ok(())
    }
}

/// Ack on success, requeue on failure
async fn settle(
    broker: &Broker,
    metrics: &Metrics,
    delivery: Delivery,
    result: Result<Outcome, DispatchError>,
) {
    match result {
        Ok(outcome) => {
            metrics.job_succeeded();
            metrics.follow_ups_published(outcome.follow_ups);
            if let Err(e) = broker.ack(&delivery) {
                // Still persisted, so it will be redelivered on restart
                error!(error = %e, "Failed to ack message");
            }
            debug!(job_type = outcome.job_type, follow_ups = outcome.follow_ups, "Message handled");
        }
        Err(e) if e.is_cancelled() => {
            info!("Handler cancelled by shutdown; message stays queued");
        }
        Err(e) => {
            metrics.job_failed();
            warn!(error = %e, "Handler failed, requeueing");
            broker.requeue(delivery).await;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "Handler panicked");
        }
    }
}
