use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::fetch::CachedFetcher;
use crate::observability::Metrics;

/// Collaborators a job needs while it runs.
///
/// The store transaction is passed to `run` separately since it is scoped to
/// a single delivery.
#[derive(Clone)]
pub struct JobContext {
    pub fetcher: CachedFetcher,
    /// Profile site root, always ending in `/`
    pub base_url: String,
    pub cancel: CancellationToken,
    pub metrics: Arc<Metrics>,
}

impl JobContext {
    pub fn new(fetcher: CachedFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            cancel: CancellationToken::new(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }
}
