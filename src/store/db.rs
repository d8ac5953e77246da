use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::info;

use super::error::Result;
use super::models::{Character, CharacterTitle, CharacterTombstone};
use super::partitions::{
    CHARACTERS, TITLES, TOMBSTONES, encode_character_key, encode_title_key, encode_tombstone_key,
};
use super::transaction::Transaction;

#[derive(Clone)]
pub(super) struct Partitions {
    pub(super) characters: PartitionHandle,
    pub(super) tombstones: PartitionHandle,
    pub(super) titles: PartitionHandle,
}

/// Fjall-backed store for characters, tombstones and titles
///
/// Cloning is cheap and every clone shares the same keyspace, so one store
/// serves the whole worker pool.
#[derive(Clone)]
pub struct CrawlStore {
    keyspace: Keyspace,
    partitions: Partitions,
}

impl CrawlStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening crawl store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;

        let partitions = Partitions {
            characters: keyspace.open_partition(CHARACTERS, PartitionCreateOptions::default())?,
            tombstones: keyspace.open_partition(TOMBSTONES, PartitionCreateOptions::default())?,
            titles: keyspace.open_partition(TITLES, PartitionCreateOptions::default())?,
        };

        Ok(Self {
            keyspace,
            partitions,
        })
    }

    /// Start a transaction
    pub fn begin(&self) -> Transaction {
        Transaction::new(self.keyspace.clone(), self.partitions.clone())
    }

    /// Get a committed character by id
    pub fn character(&self, id: i64) -> Result<Option<Character>> {
        match self.partitions.characters.get(encode_character_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Get a committed tombstone by character id
    pub fn tombstone(&self, id: i64) -> Result<Option<CharacterTombstone>> {
        match self.partitions.tombstones.get(encode_tombstone_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    pub fn has_tombstone(&self, id: i64) -> Result<bool> {
        Ok(self.partitions.tombstones.contains_key(encode_tombstone_key(id))?)
    }

    pub fn title(&self, title: &str) -> Result<Option<CharacterTitle>> {
        match self.partitions.titles.get(encode_title_key(title))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Count entries per partition
    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();

        for item in self.partitions.characters.iter() {
            item?;
            stats.characters += 1;
        }

        for item in self.partitions.tombstones.iter() {
            item?;
            stats.tombstones += 1;
        }

        for item in self.partitions.titles.iter() {
            item?;
            stats.titles += 1;
        }

        Ok(stats)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub characters: usize,
    pub tombstones: usize,
    pub titles: usize,
}
