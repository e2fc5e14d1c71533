//! Content-hash deduplication index.
//!
//! Maps a 64-bit input hash to the list of queue entries sharing that exact
//! content, and keeps every member's `duplicates` count equal to the list
//! length minus one. Eviction swaps move an entry between buckets as its
//! content is replaced; a miss during `remove` or `move_entry` means the
//! index and the queue have desynchronized, which callers treat as fatal.

use std::collections::HashMap;
use std::fmt;

use super::entry::EntryId;
use super::Queue;

/// Membership violation: an entry's recorded hash is absent from the index,
/// or the entry is not in its hash's bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputHashError {
    MissingInputHash { hash: u64 },
}

impl fmt::Display for InputHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputHashError::MissingInputHash { hash } => {
                write!(f, "input hash {hash:020} has no index entry for this queue entry")
            }
        }
    }
}

impl std::error::Error for InputHashError {}

/// All entries sharing one content hash.
#[derive(Debug, Default)]
pub struct InputHashBucket {
    pub inputs: Vec<EntryId>,
}

/// Index over every queue entry's content hash.
#[derive(Default)]
pub struct InputHashIndex {
    buckets: HashMap<u64, InputHashBucket>,
}

impl InputHashIndex {
    pub fn new() -> Self {
        InputHashIndex { buckets: HashMap::new() }
    }

    pub fn lookup(&self, hash: u64) -> Option<&InputHashBucket> {
        self.buckets.get(&hash)
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.buckets.contains_key(&hash)
    }

    /// Registers an entry under its recorded `input_hash` and refreshes the
    /// `duplicates` count on every member of the bucket.
    pub fn insert(&mut self, queue: &mut Queue, id: EntryId) {
        let hash = queue.get(id).input_hash;
        let bucket = self.buckets.entry(hash).or_default();
        bucket.inputs.push(id);
        let duplicates = bucket.inputs.len() as u32 - 1;
        for &member in &bucket.inputs {
            queue.get_mut(member).duplicates = duplicates;
        }
    }

    /// Unregisters an entry from the bucket of its recorded `input_hash`,
    /// refreshing the survivors' `duplicates` counts.
    pub fn remove(&mut self, queue: &mut Queue, id: EntryId) -> Result<(), InputHashError> {
        let hash = queue.get(id).input_hash;
        let bucket = self
            .buckets
            .get_mut(&hash)
            .ok_or(InputHashError::MissingInputHash { hash })?;
        let pos = bucket
            .inputs
            .iter()
            .position(|&member| member == id)
            .ok_or(InputHashError::MissingInputHash { hash })?;
        bucket.inputs.remove(pos);

        if bucket.inputs.is_empty() {
            self.buckets.remove(&hash);
        } else {
            let duplicates = bucket.inputs.len() as u32 - 1;
            for &member in &bucket.inputs {
                queue.get_mut(member).duplicates = duplicates;
            }
        }
        queue.get_mut(id).duplicates = 0;
        Ok(())
    }

    /// Rehomes an entry whose content is being replaced: removes it under the
    /// old hash, records `new_hash` on the entry, and inserts it again.
    pub fn move_entry(
        &mut self,
        queue: &mut Queue,
        id: EntryId,
        new_hash: u64,
    ) -> Result<(), InputHashError> {
        self.remove(queue, id)?;
        queue.get_mut(id).input_hash = new_hash;
        self.insert(queue, id);
        Ok(())
    }

    /// Number of distinct content hashes indexed.
    pub fn distinct_hashes(&self) -> usize {
        self.buckets.len()
    }
}
