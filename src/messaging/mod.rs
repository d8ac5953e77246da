//! Publishing envelopes onto the queue
//!
//! Workers and seed paths depend on [`MessageProducer`] only; the in-process
//! [`Broker`](crate::queue::Broker) is the production implementation.

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

use crate::queue::QueueError;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

pub type Result<T> = std::result::Result<T, MessagingError>;

/// Message producer for publishing envelopes
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Publish one message to a topic
    async fn publish(&self, topic: &str, message: Vec<u8>) -> Result<()>;

    /// Publish a batch. All or nothing: on error, none of the batch is enqueued.
    async fn publish_many(&self, topic: &str, messages: Vec<Vec<u8>>) -> Result<()>;
}

/// Producer that keeps every published message in memory.
///
/// Can be switched into a failing mode to exercise rollback paths.
#[derive(Debug, Default)]
pub struct RecordingProducer {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    batches: Mutex<usize>,
    fail: Mutex<bool>,
}

impl RecordingProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail (or succeed again)
    pub fn set_failing(&self, fail: bool) {
        if let Ok(mut guard) = self.fail.lock() {
            *guard = fail;
        }
    }

    /// Messages published so far, in order
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of `publish_many` calls that succeeded
    pub fn batches(&self) -> usize {
        self.batches.lock().map(|b| *b).unwrap_or_default()
    }

    fn check(&self) -> Result<()> {
        let failing = self.fail.lock().map(|f| *f).unwrap_or(false);
        if failing {
            return Err(MessagingError::PublishFailed("producer is failing".to_string()));
        }
        Ok(())
    }

    fn record(&self, topic: &str, messages: Vec<Vec<u8>>) -> Result<()> {
        let mut published = self
            .published
            .lock()
            .map_err(|e| MessagingError::PublishFailed(e.to_string()))?;
        published.extend(messages.into_iter().map(|m| (topic.to_string(), m)));
        Ok(())
    }
}

#[async_trait]
impl MessageProducer for RecordingProducer {
    async fn publish(&self, topic: &str, message: Vec<u8>) -> Result<()> {
        self.check()?;
        tracing::debug!(topic, size = message.len(), "Recorded publish");
        self.record(topic, vec![message])
    }

    async fn publish_many(&self, topic: &str, messages: Vec<Vec<u8>>) -> Result<()> {
        self.check()?;
        tracing::debug!(topic, count = messages.len(), "Recorded batch publish");
        self.record(topic, messages)?;
        if let Ok(mut batches) = self.batches.lock() {
            *batches += 1;
        }
        Ok(())
    }
}
