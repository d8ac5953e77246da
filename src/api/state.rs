use std::sync::Arc;

use crate::jobs::JobRegistry;
use crate::messaging::MessageProducer;
use crate::observability::Metrics;
use crate::queue::FjallQueue;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub producer: Arc<dyn MessageProducer>,
    pub metrics: Arc<Metrics>,
    /// Topic new jobs are published to
    pub topic: String,
    /// Checked by `GET /health` when present
    pub queue: Option<Arc<FjallQueue>>,
}

impl AppState {
    pub fn new(
        registry: Arc<JobRegistry>,
        producer: Arc<dyn MessageProducer>,
        metrics: Arc<Metrics>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            producer,
            metrics,
            topic: topic.into(),
            queue: None,
        }
    }

    pub fn with_queue(mut self, queue: Arc<FjallQueue>) -> Self {
        self.queue = Some(queue);
        self
    }
}
