//! Fetching pages from the network, with an optional response cache

pub mod cache;
pub mod client;
pub mod raw;

pub use cache::{CacheError, CachedFetcher, Fetched, ResponseCache, Source};
pub use client::{FetchRequest, HttpClient, HttpConfig, Transport};
pub use raw::{RawResponse, WireError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("Response cache error: {0}")]
    Cache(#[from] CacheError),
}

pub type Result<T> = std::result::Result<T, FetchError>;
