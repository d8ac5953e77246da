use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Invalid topic name: {0:?}")]
    InvalidTopic(String),

    #[error("Topic already has an active subscriber: {0}")]
    AlreadySubscribed(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;

const NEXT_SEQ_KEY: &[u8] = b"next_seq";

/// FjallQueue persists messages until they are acknowledged
///
/// Architecture:
/// - `messages` partition: topic ‖ 0x00 ‖ u64 (big-endian) → raw envelope bytes
/// - `metadata` partition: "next_seq" → u64 (counter shared by all topics)
///
/// Keys sort by topic, then by sequence, so a prefix scan over one topic
/// yields its pending messages in enqueue order. A message is deleted on ack;
/// anything still present on startup is redelivered.
pub struct FjallQueue {
    keyspace: Keyspace,
    messages: PartitionHandle,
    metadata: PartitionHandle,
    seq_counter: AtomicU64,
}

impl FjallQueue {
    /// Open or create a new FjallQueue at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening FjallQueue at: {}", path.as_ref().display());

        let keyspace = Config::new(path).open()?;

        let messages = keyspace.open_partition("messages", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        let stored_seq = metadata
            .get(NEXT_SEQ_KEY)?
            .map(|bytes| u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8])))
            .unwrap_or(0);

        // The counter is never behind a message that made it to disk
        let mut current_seq = stored_seq;
        for item in messages.iter() {
            let (key, _) = item?;
            if let Some((_, seq)) = decode_message_key(&key) {
                current_seq = current_seq.max(seq + 1);
            }
        }

        info!("FjallQueue opened, current sequence: {}", current_seq);

        Ok(Self {
            keyspace,
            messages,
            metadata,
            seq_counter: AtomicU64::new(current_seq),
        })
    }

    /// Persist a message and return its sequence number
    ///
    /// The message and the updated counter are written in one batch.
    pub fn enqueue(&self, topic: &str, body: &[u8]) -> Result<u64> {
        validate_topic(topic)?;
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);

        let mut batch = self.keyspace.batch();
        batch.insert(&self.messages, encode_message_key(topic, seq), body);
        batch.insert(&self.metadata, NEXT_SEQ_KEY, (seq + 1).to_be_bytes());
        batch.commit()?;

        debug!(topic, seq, size = body.len(), "Message enqueued");
        Ok(seq)
    }

    /// Persist several messages atomically
    ///
    /// Either every message is written or none is. Sequence numbers are
    /// contiguous and returned in input order.
    pub fn enqueue_batch(&self, topic: &str, bodies: &[Vec<u8>]) -> Result<Vec<u64>> {
        validate_topic(topic)?;
        if bodies.is_empty() {
            return Ok(Vec::new());
        }

        let count = bodies.len() as u64;
        let first = self.seq_counter.fetch_add(count, Ordering::SeqCst);

        let mut batch = self.keyspace.batch();
        let mut seqs = Vec::with_capacity(bodies.len());
        for (offset, body) in bodies.iter().enumerate() {
            let seq = first + offset as u64;
            batch.insert(&self.messages, encode_message_key(topic, seq), body.as_slice());
            seqs.push(seq);
        }
        batch.insert(&self.metadata, NEXT_SEQ_KEY, (first + count).to_be_bytes());
        batch.commit()?;

        debug!(topic, first_seq = first, count, "Batch enqueued");
        Ok(seqs)
    }

    /// Retrieve a pending message
    pub fn get(&self, topic: &str, seq: u64) -> Result<Option<Vec<u8>>> {
        Ok(self
            .messages
            .get(encode_message_key(topic, seq))?
            .map(|bytes| bytes.to_vec()))
    }

    /// Remove an acknowledged message
    pub fn ack(&self, topic: &str, seq: u64) -> Result<()> {
        self.messages.remove(encode_message_key(topic, seq))?;
        debug!(topic, seq, "Message acknowledged");
        Ok(())
    }

    /// Every unacknowledged message on a topic, in ascending sequence order
    pub fn pending(&self, topic: &str) -> Result<Vec<(u64, Vec<u8>)>> {
        validate_topic(topic)?;
        let mut results = Vec::new();

        for item in self.messages.prefix(topic_prefix(topic)) {
            let (key, value) = item?;
            if let Some((_, seq)) = decode_message_key(&key) {
                results.push((seq, value.to_vec()));
            }
        }

        Ok(results)
    }

    /// Number of unacknowledged messages on a topic
    pub fn pending_count(&self, topic: &str) -> Result<usize> {
        let mut count = 0;
        for item in self.messages.prefix(topic_prefix(topic)) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Get current sequence counter value
    pub fn current_seq(&self) -> u64 {
        self.seq_counter.load(Ordering::SeqCst)
    }

    /// Flush all writes to disk
    pub fn flush(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Health check - verify database is accessible
    pub fn health_check(&self) -> Result<()> {
        let _ = self.metadata.get(NEXT_SEQ_KEY)?;
        Ok(())
    }
}

fn validate_topic(topic: &str) -> Result<()> {
    if topic.is_empty() || topic.as_bytes().contains(&0) {
        return Err(QueueError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}

fn topic_prefix(topic: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(topic.len() + 1);
    prefix.extend_from_slice(topic.as_bytes());
    prefix.push(0);
    prefix
}

fn encode_message_key(topic: &str, seq: u64) -> Vec<u8> {
    let mut key = topic_prefix(topic);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn decode_message_key(key: &[u8]) -> Option<(&str, u64)> {
    let split = key.iter().position(|b| *b == 0)?;
    let topic = std::str::from_utf8(&key[..split]).ok()?;
    let seq_bytes: [u8; 8] = key[split + 1..].try_into().ok()?;
    Some((topic, u64::from_be_bytes(seq_bytes)))
}
