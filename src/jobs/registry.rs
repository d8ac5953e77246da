use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use super::{FetchCharacterJob, FetchCharacterRangeJob, Job};

/// A job kind that can travel in an envelope
pub trait JobKind: Serialize + DeserializeOwned + Into<Job> {
    /// Stable wire tag, e.g. `"character"`
    const TAG: &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job type: {0}")]
pub struct UnknownTag(pub String);

type DecodeFn = fn(Value) -> Result<Job, serde_json::Error>;

fn decode_as<T: JobKind>(payload: Value) -> Result<Job, serde_json::Error> {
    serde_json::from_value::<T>(payload).map(Into::into)
}

/// Maps wire tags to payload decoders
///
/// Built once at startup with every known kind and only read afterwards.
#[derive(Clone, Default)]
pub struct JobRegistry {
    decoders: BTreeMap<&'static str, DecodeFn>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: JobKind>(&mut self) {
        self.decoders.insert(T::TAG, decode_as::<T>);
    }

    /// Registry with every built-in job kind
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<FetchCharacterJob>();
        registry.register::<FetchCharacterRangeJob>();
        registry
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.decoders.keys().copied()
    }

    /// Decode a payload for a registered tag
    pub fn construct(&self, tag: &str, payload: Value) -> Result<Result<Job, serde_json::Error>, UnknownTag> {
        let decode = self
            .decoders
            .get(tag)
            .ok_or_else(|| UnknownTag(tag.to_string()))?;
        Ok(decode(payload))
    }
}
