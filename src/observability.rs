//! Metrics counters and tracing setup

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    deliveries_received: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    decode_failures: AtomicU64,
    follow_ups_published: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    tombstones_created: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivery_received(&self) {
        self.deliveries_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_succeeded(&self) {
        self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_succeeded", "Metric incremented");
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "Metric incremented");
    }

    pub fn decode_failed(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "decode_failures", "Metric incremented");
    }

    pub fn follow_ups_published(&self, count: usize) {
        self.follow_ups_published.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tombstone_created(&self) {
        self.tombstones_created.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tombstones_created", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            deliveries_received: self.deliveries_received.load(Ordering::Relaxed),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            follow_ups_published: self.follow_ups_published.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            tombstones_created: self.tombstones_created.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub deliveries_received: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub decode_failures: u64,
    pub follow_ups_published: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub tombstones_created: u64,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` controls filtering and defaults to `info`. Calling this twice is
/// harmless; the second call leaves the first subscriber in place.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = Metrics::new();
        metrics.delivery_received();
        metrics.delivery_received();
        metrics.job_succeeded();
        metrics.job_failed();
        metrics.follow_ups_published(3);
        metrics.cache_hit();
        metrics.tombstone_created();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.deliveries_received, 2);
        assert_eq!(snapshot.jobs_succeeded, 1);
        assert_eq!(snapshot.jobs_failed, 1);
        assert_eq!(snapshot.follow_ups_published, 3);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 0);
        assert_eq!(snapshot.tombstones_created, 1);
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let value = serde_json::to_value(Metrics::new().snapshot()).unwrap();
        assert_eq!(value["jobs_succeeded"], 0);
        assert_eq!(value["decode_failures"], 0);
    }

    #[test]
    fn test_init_tracing_twice_does_not_panic() {
        init_tracing(LogFormat::Pretty);
        init_tracing(LogFormat::Json);
    }
}
