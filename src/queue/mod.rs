pub mod broker;
pub mod store;

pub use broker::{Broker, Delivery, RequeuePolicy};
pub use store::{FjallQueue, QueueError};
