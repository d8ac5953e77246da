//! Fjall-backed persistence for crawl results
//!
//! The store holds everything the fetcher learns about characters:
//!
//! - Characters (upserted by id, so redelivered fetches converge)
//! - Tombstones (ids known not to exist; never fetched again)
//! - Titles (stored once, referenced by text)
//!
//! All writes go through a [`Transaction`], which buffers them and applies
//! them as one atomic batch on commit. A handler that fails simply drops its
//! transaction and nothing it wrote becomes visible.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crawlbox::store::CrawlStore;
//!
//! let store = CrawlStore::open("data/store")?;
//! let mut tx = store.begin();
//! if !tx.tombstone_exists(42)? {
//!     tx.create_tombstone(42)?;
//! }
//! tx.commit()?;
//! ```

pub mod db;
pub mod error;
pub mod models;
pub mod partitions;
pub mod transaction;

pub use db::{CrawlStore, StoreStats};
pub use error::{Result, StoreError};
pub use models::{Character, CharacterTitle, CharacterTombstone, Clan, Race};
pub use transaction::Transaction;
