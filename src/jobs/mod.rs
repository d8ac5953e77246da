//! Work items
//!
//! A job is one unit of crawl work. The set of job kinds is closed: each kind
//! is a variant of [`Job`], carries its own parameters, and is identified on
//! the wire by a stable tag (see [`envelope`]). Running a job may produce
//! follow-up jobs, which the worker publishes back onto the queue.

pub mod character;
pub mod context;
pub mod envelope;
pub mod range;
pub mod registry;

pub use character::FetchCharacterJob;
pub use context::JobContext;
pub use envelope::{Envelope, EnvelopeError};
pub use range::{FetchCharacterRangeJob, RANGE_CHUNK};
pub use registry::{JobKind, JobRegistry, UnknownTag};

use std::fmt;
use thiserror::Error;

use crate::fetch::FetchError;
use crate::store::{StoreError, Transaction};

/// Topic every fetch job is published to
pub const FETCH_TOPIC: &str = "fetch";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Character(FetchCharacterJob),
    CharacterRange(FetchCharacterRangeJob),
}

impl Job {
    /// Wire tag for this job's kind
    pub fn tag(&self) -> &'static str {
        match self {
            Job::Character(_) => FetchCharacterJob::TAG,
            Job::CharacterRange(_) => FetchCharacterRangeJob::TAG,
        }
    }

    /// Run the job against an open transaction and return any follow-up work
    pub async fn run(&self, ctx: &JobContext, tx: &mut Transaction) -> Result<Vec<Job>, JobError> {
        match self {
            Job::Character(job) => job.run(ctx, tx).await,
            Job::CharacterRange(job) => job.run(ctx, tx).await,
        }
    }
}

impl From<FetchCharacterJob> for Job {
    fn from(job: FetchCharacterJob) -> Self {
        Job::Character(job)
    }
}

impl From<FetchCharacterRangeJob> for Job {
    fn from(job: FetchCharacterRangeJob) -> Self {
        Job::CharacterRange(job)
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("{0}")]
    Parse(#[from] ParseErrors),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cancelled by shutdown")]
    Cancelled,
}

/// One field that could not be extracted from a page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Every field error found while parsing one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseErrors(Vec<FieldError>);

impl ParseErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    /// Record the error of a failed step, if any
    pub fn collect(&mut self, result: Result<(), FieldError>) {
        if let Err(e) = result {
            self.push(e);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// `Ok` if nothing was recorded
    pub fn into_result(self) -> Result<(), ParseErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} parse error(s): ", self.0.len())?;
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}
