//! Response cache and the idempotent fetch wrapper
//!
//! Entries are keyed by a caller-chosen key rather than the URL, and stored
//! one object per key as `<key>.http` through `object_store`, so the same
//! code runs against a local directory or an in-memory store in tests.

use object_store::{ObjectStore, local::LocalFileSystem, memory::InMemory, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::client::{FetchRequest, Transport};
use super::raw::{RawResponse, WireError};
use super::Result;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Cached response for '{key}' is unreadable: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: WireError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filesystem-style cache of raw responses
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn ObjectStore>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Cache rooted at a local directory, created if missing
    pub fn local<P: AsRef<Path>>(dir: P) -> std::result::Result<Self, CacheError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        info!("Using response cache at: {}", dir.display());
        let store = LocalFileSystem::new_with_prefix(dir)?;
        Ok(Self::new(Arc::new(store)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    fn path(key: &str) -> StoragePath {
        StoragePath::from(format!("{}.http", key))
    }

    pub async fn get(&self, key: &str) -> std::result::Result<Option<RawResponse>, CacheError> {
        let result = match self.store.get(&Self::path(key)).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let bytes = result.bytes().await?;
        RawResponse::from_wire(&bytes)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    pub async fn put(&self, key: &str, response: &RawResponse) -> std::result::Result<(), CacheError> {
        self.store
            .put(&Self::path(key), response.to_wire().into())
            .await?;
        Ok(())
    }

    pub async fn contains(&self, key: &str) -> std::result::Result<bool, CacheError> {
        match self.store.head(&Self::path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Where a fetched response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub response: RawResponse,
    pub source: Source,
}

/// Transport wrapped with an optional response cache.
///
/// With a cache configured, a hit is returned verbatim without touching the
/// network; a miss goes to the network and only a 200 OK is written back, so
/// transient failures never poison later attempts. Without a cache every
/// call passes straight through.
#[derive(Clone)]
pub struct CachedFetcher {
    transport: Arc<dyn Transport>,
    cache: Option<ResponseCache>,
}

impl CachedFetcher {
    pub fn new(transport: Arc<dyn Transport>, cache: Option<ResponseCache>) -> Self {
        Self { transport, cache }
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    /// Fetch through the cache
    pub async fn fetch(&self, key: &str, request: &FetchRequest) -> Result<Fetched> {
        if let Some(cache) = &self.cache {
            if let Some(response) = cache.get(key).await? {
                info!(key, status = response.status, "Reusing a cached response");
                return Ok(Fetched {
                    response,
                    source: Source::Cache,
                });
            }
        }

        self.fetch_from_network(key, request).await
    }

    /// Skip the cache lookup but still record a successful response
    pub async fn refresh(&self, key: &str, request: &FetchRequest) -> Result<Fetched> {
        self.fetch_from_network(key, request).await
    }

    async fn fetch_from_network(&self, key: &str, request: &FetchRequest) -> Result<Fetched> {
        let response = self.transport.send(request).await?;

        if let Some(cache) = &self.cache {
            if response.is_ok() {
                info!(key, "Writing response to cache");
                cache.put(key, &response).await?;
            } else {
                debug!(
                    key,
                    url = %request.url,
                    status = response.status,
                    "Not caching unsuccessful response"
                );
            }
        }

        Ok(Fetched {
            response,
            source: Source::Network,
        })
    }
}
