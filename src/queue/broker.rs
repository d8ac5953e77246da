use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::messaging::{self, MessageProducer};
use crate::queue::store::{FjallQueue, QueueError, Result};

/// A message handed to a subscriber
#[derive(Clone, Debug)]
pub struct Delivery {
    pub topic: String,
    pub seq: u64,
    pub body: Bytes,
    /// 1 on first delivery, incremented on every requeue
    pub attempts: u32,
}

/// Redelivery backoff
#[derive(Debug, Clone, Copy)]
pub struct RequeuePolicy {
    pub delay: Duration,
    pub max_delay: Duration,
}

impl RequeuePolicy {
    /// Delay before redelivering a message that has failed `attempts` times
    pub fn backoff(&self, attempts: u32) -> Duration {
        self.delay.saturating_mul(attempts.max(1)).min(self.max_delay)
    }
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        RequeuePolicy::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for RequeuePolicy {
    fn from(config: &QueueConfig) -> Self {
        Self {
            delay: config.requeue_delay.as_duration(),
            max_delay: config.max_requeue_delay.as_duration(),
        }
    }
}

/// Broker distributes persisted messages to topic subscribers
///
/// Architecture:
/// 1. Producers call `publish` / `publish_many`
/// 2. Broker persists the message(s) to FjallQueue (atomic, get seq)
/// 3. Broker sends a Delivery to the topic's subscriber channel
/// 4. The subscriber acks on success or requeues on failure
///
/// Delivery is at-least-once: a message stays in Fjall until acked, and
/// `subscribe` replays everything still pending, so a crash between
/// processing and ack redelivers the message after restart.
///
/// Channels are unbounded so a worker publishing follow-up work to its own
/// topic can never block on itself. The queue itself is the buffer.
pub struct Broker {
    queue: Arc<FjallQueue>,
    subscribers: Mutex<HashMap<String, mpsc::UnboundedSender<Delivery>>>,
    policy: RequeuePolicy,
}

impl Broker {
    pub fn new(queue: Arc<FjallQueue>, policy: RequeuePolicy) -> Self {
        info!(
            requeue_delay_ms = policy.delay.as_millis() as u64,
            max_requeue_delay_ms = policy.max_delay.as_millis() as u64,
            "Creating Broker"
        );

        Self {
            queue,
            subscribers: Mutex::new(HashMap::new()),
            policy,
        }
    }

    pub fn queue(&self) -> &Arc<FjallQueue> {
        &self.queue
    }

    /// Persist a message and deliver it to the topic's subscriber, if any
    pub async fn publish(&self, topic: &str, body: Vec<u8>) -> Result<u64> {
        // Held across persist and send so a concurrent subscribe cannot
        // replay a message that is also delivered here
        let mut subscribers = self.subscribers.lock().await;
        let seq = self.queue.enqueue(topic, &body)?;

        Self::deliver(&mut subscribers, topic, seq, Bytes::from(body));
        Ok(seq)
    }

    /// Persist a batch atomically, then deliver every message in order
    pub async fn publish_many(&self, topic: &str, bodies: Vec<Vec<u8>>) -> Result<Vec<u64>> {
        let mut subscribers = self.subscribers.lock().await;
        let seqs = self.queue.enqueue_batch(topic, &bodies)?;

        for (seq, body) in seqs.iter().zip(bodies) {
            Self::deliver(&mut subscribers, topic, *seq, Bytes::from(body));
        }
        Ok(seqs)
    }

    fn deliver(
        subscribers: &mut HashMap<String, mpsc::UnboundedSender<Delivery>>,
        topic: &str,
        seq: u64,
        body: Bytes,
    ) {
        let Some(tx) = subscribers.get(topic) else {
            debug!(topic, seq, "No subscriber, message stays queued");
            return;
        };

        let delivery = Delivery {
            topic: topic.to_string(),
            seq,
            body,
            attempts: 1,
        };

        if tx.send(delivery).is_err() {
            warn!(topic, seq, "Subscriber gone, message stays queued");
            subscribers.remove(topic);
        }
    }

    /// Subscribe to a topic
    ///
    /// Every pending message is replayed into the returned channel first,
    /// followed by new publishes. One live subscriber per topic.
    pub async fn subscribe(&self, topic: &str) -> Result<mpsc::UnboundedReceiver<Delivery>> {
        let mut subscribers = self.subscribers.lock().await;
        if subscribers.get(topic).is_some_and(|tx| !tx.is_closed()) {
            return Err(QueueError::AlreadySubscribed(topic.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let pending = self.queue.pending(topic)?;
        let replayed = pending.len();

        for (seq, body) in pending {
            let delivery = Delivery {
                topic: topic.to_string(),
                seq,
                body: Bytes::from(body),
                attempts: 1,
            };
            // rx is alive in this scope
            let _ = tx.send(delivery);
        }

        subscribers.insert(topic.to_string(), tx);
        info!(topic, replayed, "Subscribed");
        Ok(rx)
    }

    /// Drop the subscription for a topic; pending messages stay queued
    pub async fn unsubscribe(&self, topic: &str) {
        self.subscribers.lock().await.remove(topic);
    }

    /// Acknowledge a successfully handled message
    pub fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.queue.ack(&delivery.topic, delivery.seq)
    }

    /// Redeliver a failed message after a backoff
    ///
    /// The message is still persisted, so if the subscriber goes away before
    /// the backoff elapses it is picked up by the next `subscribe`.
    pub async fn requeue(&self, delivery: Delivery) {
        let delay = self.policy.backoff(delivery.attempts);
        let Some(tx) = self.subscribers.lock().await.get(&delivery.topic).cloned() else {
            debug!(topic = %delivery.topic, seq = delivery.seq, "No subscriber, requeue deferred to next subscribe");
            return;
        };

        debug!(
            topic = %delivery.topic,
            seq = delivery.seq,
            attempts = delivery.attempts,
            delay_ms = delay.as_millis() as u64,
            "Requeueing message"
        );

        let redelivery = Delivery {
            attempts: delivery.attempts.saturating_add(1),
            ..delivery
        };

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(redelivery).is_err() {
                debug!("Subscriber closed before redelivery, message stays queued");
            }
        });
    }

    /// Flush the queue to disk
    pub fn flush(&self) -> Result<()> {
        self.queue.flush()
    }
}

#[async_trait]
impl MessageProducer for Broker {
    async fn publish(&self, topic: &str, message: Vec<u8>) -> messaging::Result<()> {
        Broker::publish(self, topic, message).await?;
        Ok(())
    }

    async fn publish_many(&self, topic: &str, messages: Vec<Vec<u8>>) -> messaging::Result<()> {
        Broker::publish_many(self, topic, messages).await?;
        Ok(())
    }
}
