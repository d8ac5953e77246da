//! Per-delivery handling: decode, run in a transaction, publish follow-ups

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tower::Service;
use tracing::debug;

use crate::jobs::{EnvelopeError, Job, JobContext, JobError, JobRegistry, envelope};
use crate::messaging::{MessageProducer, MessagingError};
use crate::observability::Metrics;
use crate::store::{CrawlStore, StoreError, Transaction};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Decode failed: {0}")]
    Decode(#[from] EnvelopeError),

    #[error("Job failed: {0}")]
    Job(#[from] JobError),

    #[error("Encoding follow-up failed: {0}")]
    Encode(#[source] EnvelopeError),

    #[error("Publishing follow-ups failed: {0}")]
    Publish(#[from] MessagingError),

    #[error("Commit failed: {0}")]
    Store(#[from] StoreError),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl DispatchError {
    /// Shutdown interrupted the job; the message is left for the next start
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DispatchError::Job(JobError::Cancelled))
    }
}

/// Result of a successfully handled message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub job_type: &'static str,
    pub follow_ups: usize,
}

/// Handles one envelope end to end.
///
/// The job runs inside a store transaction. Its follow-ups are published
/// before the transaction commits; if running, publishing or committing
/// fails, the transaction is rolled back and the error returned so the
/// broker redelivers the message.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<JobRegistry>,
    store: CrawlStore,
    producer: Arc<dyn MessageProducer>,
    ctx: JobContext,
    topic: String,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<JobRegistry>,
        store: CrawlStore,
        producer: Arc<dyn MessageProducer>,
        ctx: JobContext,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            store,
            producer,
            ctx,
            topic: topic.into(),
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.ctx.metrics
    }

    pub fn store(&self) -> &CrawlStore {
        &self.store
    }

    pub async fn dispatch(&self, body: &[u8]) -> Result<Outcome, DispatchError> {
        let job = envelope::decode(&self.registry, body).inspect_err(|_| self.ctx.metrics.decode_failed())?;
        self.run_in(&job, self.store.begin()).await
    }

    /// Run a decoded job in `tx`, committing only if it and its follow-up
    /// publish both succeed
    async fn run_in(&self, job: &Job, mut tx: Transaction) -> Result<Outcome, DispatchError> {
        match self.execute(job, &mut tx).await {
            Ok(follow_ups) => {
                tx.commit()?;
                Ok(Outcome {
                    job_type: job.tag(),
                    follow_ups,
                })
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    async fn execute(&self, job: &Job, tx: &mut Transaction) -> Result<usize, DispatchError> {
        let follow_ups = job.run(&self.ctx, tx).await?;
        self.publish(&follow_ups).await?;
        Ok(follow_ups.len())
    }

    async fn publish(&self, jobs: &[Job]) -> Result<(), DispatchError> {
        match jobs {
            [] => Ok(()),
            [job] => {
                let body = envelope::encode(job).map_err(DispatchError::Encode)?;
                self.producer.publish(&self.topic, body).await?;
                Ok(())
            }
            _ => {
                let bodies = envelope::encode_all(jobs).map_err(DispatchError::Encode)?;
                debug!(count = bodies.len(), topic = %self.topic, "Publishing follow-ups");
                self.producer.publish_many(&self.topic, bodies).await?;
                Ok(())
            }
        }
    }
}

impl Service<Bytes> for Dispatcher {
    type Response = Outcome;
    type Error = DispatchError;
    type Future = Pin<Box<dyn Future<Output = Result<Outcome, DispatchError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, body: Bytes) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.dispatch(&body).await })
    }
}
