use std::collections::BTreeMap;

use fjall::{Keyspace, PartitionHandle};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::db::Partitions;
use super::error::Result;
use super::models::{Character, CharacterTitle, CharacterTombstone, now_rfc3339};
use super::partitions::{encode_character_key, encode_title_key, encode_tombstone_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Table {
    Characters,
    Tombstones,
    Titles,
}

/// A unit of writes against the store.
///
/// Writes are buffered and become visible to other transactions only on
/// [`Transaction::commit`], which applies them as one atomic Fjall batch.
/// Reads see this transaction's own buffered writes first. Dropping a
/// transaction without committing discards everything it buffered.
pub struct Transaction {
    keyspace: Keyspace,
    partitions: Partitions,
    pending: BTreeMap<(Table, Vec<u8>), Vec<u8>>,
}

impl Transaction {
    pub(super) fn new(keyspace: Keyspace, partitions: Partitions) -> Self {
        Self {
            keyspace,
            partitions,
            pending: BTreeMap::new(),
        }
    }

    /// Check whether a character has been tombstoned
    pub fn tombstone_exists(&self, id: i64) -> Result<bool> {
        let key = encode_tombstone_key(id);
        if self.pending.contains_key(&(Table::Tombstones, key.clone())) {
            return Ok(true);
        }
        Ok(self.partitions.tombstones.contains_key(key)?)
    }

    /// Record that a character does not exist.
    ///
    /// Returns `false` if a tombstone was already present; the existing one is kept.
    pub fn create_tombstone(&mut self, id: i64) -> Result<bool> {
        if self.tombstone_exists(id)? {
            return Ok(false);
        }

        let tombstone = CharacterTombstone {
            id,
            created_at: now_rfc3339(),
        };
        self.put(Table::Tombstones, encode_tombstone_key(id), &tombstone)?;
        Ok(true)
    }

    /// Insert or update a character, keeping the original `created_at`
    pub fn upsert_character(&mut self, character: &Character) -> Result<Character> {
        let key = encode_character_key(character.id);
        let now = now_rfc3339();

        let created_at = match self.get::<Character>(Table::Characters, &key)? {
            Some(existing) => existing.created_at,
            None => now.clone(),
        };

        let stored = Character {
            created_at,
            updated_at: now,
            ..character.clone()
        };
        self.put(Table::Characters, key, &stored)?;
        Ok(stored)
    }

    /// Return the stored title, creating it if this is the first time it is seen
    pub fn get_or_create_title(&mut self, title: &str) -> Result<CharacterTitle> {
        let key = encode_title_key(title);
        if let Some(existing) = self.get::<CharacterTitle>(Table::Titles, &key)? {
            return Ok(existing);
        }

        let created = CharacterTitle {
            title: title.to_string(),
            created_at: now_rfc3339(),
        };
        self.put(Table::Titles, key, &created)?;
        Ok(created)
    }

    /// Number of buffered writes
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Apply every buffered write atomically
    pub fn commit(mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(());
        }

        let writes = pending.len();
        let mut batch = self.keyspace.batch();
        for ((table, key), value) in pending {
            batch.insert(self.partition(table), key, value);
        }
        batch.commit()?;

        debug!(writes, "Transaction committed");
        Ok(())
    }

    /// Discard every buffered write
    pub fn rollback(mut self) {
        let discarded = std::mem::take(&mut self.pending).len();
        debug!(discarded, "Transaction rolled back");
    }

    fn partition(&self, table: Table) -> &PartitionHandle {
        match table {
            Table::Characters => &self.partitions.characters,
            Table::Tombstones => &self.partitions.tombstones,
            Table::Titles => &self.partitions.titles,
        }
    }

    fn get<T: DeserializeOwned>(&self, table: Table, key: &[u8]) -> Result<Option<T>> {
        if let Some(value) = self.pending.get(&(table, key.to_vec())) {
            return Ok(Some(serde_json::from_slice(value)?));
        }
        match self.partition(table).get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&mut self, table: Table, key: Vec<u8>, value: &T) -> Result<()> {
        let value = serde_json::to_vec(value)?;
        self.pending.insert((table, key), value);
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            debug!(discarded = self.pending.len(), "Uncommitted transaction dropped");
        }
    }
}
