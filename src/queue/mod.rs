//! Corpus queue: entry storage, the content-hash deduplication index, the
//! per-(edge, bucket) diversity cells, and favored-set maintenance.

pub mod edge_index;
pub mod entry;
pub mod favored;
pub mod input_hash;

use std::path::PathBuf;

use crate::bitmap::NewCoverage;
use crate::diversity::PayloadKind;

pub use edge_index::{EdgeCell, EdgeIndex};
pub use entry::{EntryId, QueueEntry};
pub use input_hash::{InputHashBucket, InputHashError, InputHashIndex};

/// Append-only vector owning every [`QueueEntry`] for the lifetime of the
/// process. Edge cells and the hash index refer to entries by [`EntryId`];
/// nothing else owns them.
#[derive(Default)]
pub struct Queue {
    entries: Vec<QueueEntry>,
}

impl Queue {
    pub fn new() -> Self {
        Queue { entries: Vec::new() }
    }

    /// Appends a fresh entry and returns its id. The caller fills in
    /// testcase bytes, hashes and trace data before the entry is indexed.
    pub fn add(
        &mut self,
        fname: PathBuf,
        len: u32,
        passed_det: bool,
        depth: u32,
        exec_cksum: u64,
        new_bits: NewCoverage,
    ) -> EntryId {
        let id = self.entries.len();
        self.entries.push(QueueEntry {
            fname,
            len,
            testcase: Vec::new(),
            input_hash: 0,
            exec_cksum,
            trace_mini: Vec::new(),
            compressed_len: 0,
            edge_cell: None,
            cal_failed: false,
            exec_us: 0,
            bitmap_size: 0,
            handicap: 0,
            depth,
            passed_det,
            favored: false,
            ncdm_favored: false,
            was_fuzzed: false,
            fuzz_level: 0,
            has_new_cov: new_bits == NewCoverage::NewEdges,
            duplicates: 0,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntryId) -> &QueueEntry {
        &self.entries[id]
    }

    pub fn get_mut(&mut self, id: EntryId) -> &mut QueueEntry {
        &mut self.entries[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut QueueEntry> {
        self.entries.iter_mut()
    }

    pub fn ids(&self) -> std::ops::Range<EntryId> {
        0..self.entries.len()
    }

    /// Id of the most recently added entry.
    pub fn top(&self) -> Option<EntryId> {
        self.entries.len().checked_sub(1)
    }
}

/// The bytes an entry contributes to diversity scoring under the given
/// payload selection.
pub(crate) fn entry_payload(entry: &QueueEntry, kind: PayloadKind) -> &[u8] {
    match kind {
        PayloadKind::Testcase => &entry.testcase,
        PayloadKind::TraceMini => &entry.trace_mini,
    }
}
