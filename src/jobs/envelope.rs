//! Wire format for jobs on the queue
//!
//! ```json
//! {"t": "character", "d": {"id": 42, "force": false}}
//! ```
//!
//! Decoding is two-phase: the tag is read first and resolved through the
//! [`JobRegistry`], then `d` is decoded into that kind's type.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::registry::{JobRegistry, UnknownTag};
use super::Job;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("empty envelope")]
    EmptyEnvelope,

    #[error(transparent)]
    UnknownTag(#[from] UnknownTag),

    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("invalid payload for '{tag}': {source}")]
    Payload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;

/// A tagged, serialized job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub t: String,
    #[serde(default)]
    pub d: Value,
}

impl Envelope {
    pub fn from_job(job: &Job) -> Result<Self> {
        let d = match job {
            Job::Character(j) => serde_json::to_value(j),
            Job::CharacterRange(j) => serde_json::to_value(j),
        }
        .map_err(EnvelopeError::Malformed)?;

        Ok(Self {
            t: job.tag().to_string(),
            d,
        })
    }

    /// Resolve the tag and decode the payload
    pub fn into_job(self, registry: &JobRegistry) -> Result<Job> {
        if self.t.is_empty() {
            return Err(EnvelopeError::EmptyEnvelope);
        }
        let Envelope { t, d } = self;
        registry
            .construct(&t, d)?
            .map_err(|source| EnvelopeError::Payload { tag: t, source })
    }
}

/// Serialize a job to envelope bytes
pub fn encode(job: &Job) -> Result<Vec<u8>> {
    let envelope = Envelope::from_job(job)?;
    serde_json::to_vec(&envelope).map_err(EnvelopeError::Malformed)
}

/// Serialize several jobs, failing on the first that cannot be encoded
pub fn encode_all(jobs: &[Job]) -> Result<Vec<Vec<u8>>> {
    jobs.iter().map(encode).collect()
}

/// Decode envelope bytes into a job
pub fn decode(registry: &JobRegistry, bytes: &[u8]) -> Result<Job> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(EnvelopeError::EmptyEnvelope);
    }
    let value: Value = serde_json::from_slice(bytes).map_err(EnvelopeError::Malformed)?;
    decode_value(registry, value)
}

/// Decode an already-parsed JSON envelope
pub fn decode_value(registry: &JobRegistry, value: Value) -> Result<Job> {
    if value.is_null() {
        return Err(EnvelopeError::EmptyEnvelope);
    }
    let envelope: Envelope = serde_json::from_value(value).map_err(EnvelopeError::Malformed)?;
    envelope.into_job(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{FetchCharacterJob, FetchCharacterRangeJob};
    use serde_json::json;

    fn registry() -> JobRegistry {
        JobRegistry::with_defaults()
    }

    #[test]
    fn test_wire_layout() {
        let job = Job::from(FetchCharacterJob { id: 42, force: false });
        let value: Value = serde_json::from_slice(&encode(&job).unwrap()).unwrap();
        assert_eq!(value, json!({"t": "character", "d": {"id": 42, "force": false}}));
    }

    #[test]
    fn test_round_trip_every_kind() {
        let jobs = vec![
            Job::from(FetchCharacterJob { id: 7248246, force: true }),
            Job::from(FetchCharacterRangeJob { start: 1_000, count: 1_200 }),
        ];

        for job in jobs {
            let decoded = decode(&registry(), &encode(&job).unwrap()).unwrap();
            assert_eq!(decoded, job);
        }
    }

    #[test]
    fn test_unknown_tag() {
        let result = decode(&registry(), br#"{"t": "free_company", "d": {"id": 1}}"#);
        assert!(matches!(result, Err(EnvelopeError::UnknownTag(UnknownTag(tag))) if tag == "free_company"));
    }

    #[test]
    fn test_empty_envelopes() {
        assert!(matches!(decode(&registry(), b""), Err(EnvelopeError::EmptyEnvelope)));
        assert!(matches!(decode(&registry(), b"null"), Err(EnvelopeError::EmptyEnvelope)));
        assert!(matches!(
            decode(&registry(), br#"{"t": "", "d": {}}"#),
            Err(EnvelopeError::EmptyEnvelope)
        ));
    }

    #[test]
    fn test_malformed_envelope() {
        assert!(matches!(decode(&registry(), b"{not json"), Err(EnvelopeError::Malformed(_))));
        assert!(matches!(decode(&registry(), br#"{"d": {}}"#), Err(EnvelopeError::Malformed(_))));
    }

    #[test]
    fn test_payload_must_match_tag() {
        let result = decode(&registry(), br#"{"t": "character", "d": {"id": "not a number"}}"#);
        assert!(matches!(result, Err(EnvelopeError::Payload { tag, .. }) if tag == "character"));
    }

    #[test]
    fn test_missing_optional_fields_take_defaults() {
        let job = decode(&registry(), br#"{"t": "character", "d": {"id": 5}}"#).unwrap();
        assert_eq!(job, Job::from(FetchCharacterJob { id: 5, force: false }));
    }
}
