//! Request and response bodies for the HTTP surface.
//!
//! `POST /jobs` takes either a single envelope or an array of them:
//!
//! ```json
//! {"t": "character", "d": {"id": 7248246}}
//! ```
//!
//! ```json
//! [
//!   {"t": "character", "d": {"id": 1, "force": true}},
//!   {"t": "character_range", "d": {"start": 1000, "count": 2500}}
//! ]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One envelope or a batch
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum JobsRequest {
    Batch(Vec<Value>),
    Single(Value),
}

impl JobsRequest {
    pub fn into_envelopes(self) -> Vec<Value> {
        match self {
            JobsRequest::Batch(envelopes) => envelopes,
            JobsRequest::Single(envelope) => vec![envelope],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnqueueResponse {
    pub enqueued: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}
