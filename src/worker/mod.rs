//! Worker pool
//!
//! Deliveries from the broker are handled by a [`Dispatcher`] tower service
//! under a concurrency limit. Each delivery is decoded, run inside a store
//! transaction, and its follow-up jobs are published before commit. Success
//! acks the message; any failure rolls back and requeues it.

pub mod dispatch;
pub mod pool;

pub use dispatch::{DispatchError, Dispatcher, Outcome};
pub use pool::{PoolSettings, WorkerPool};

use thiserror::Error;

use crate::queue::QueueError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
