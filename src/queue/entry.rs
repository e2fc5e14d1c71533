//! Queue entries.

use std::path::PathBuf;

use crate::exec::{Calibration, Fault};

/// Index of an entry in the owning [`Queue`](super::Queue). Stable for the
/// lifetime of the process: the queue is append-only and swaps replace entry
/// contents in place.
pub type EntryId = usize;

/// One saved input and everything the scheduler needs to know about it.
///
/// Entries are created when the pipeline decides to save, mutated in place by
/// an eviction swap (which preserves the entry's slot in its edge cell), and
/// destroyed only at shutdown.
#[derive(Debug)]
pub struct QueueEntry {
    /// Path of the persisted file; always holds exactly `testcase`.
    pub fname: PathBuf,
    pub len: u32,
    /// In-memory copy of the input.
    pub testcase: Vec<u8>,
    /// Content hash of `testcase`.
    pub input_hash: u64,
    /// Checksum of the classified trace; 0 until calibration fills it.
    pub exec_cksum: u64,
    /// Packed edge-presence vector for the trace that produced this entry.
    pub trace_mini: Vec<u8>,
    /// Compressed size of the diversity payload.
    pub compressed_len: u32,
    /// Back-index of the owning edge cell, when this entry represents one.
    pub edge_cell: Option<usize>,
    pub cal_failed: bool,
    pub exec_us: u64,
    pub bitmap_size: u32,
    pub handicap: u32,
    pub depth: u32,
    pub passed_det: bool,
    pub favored: bool,
    pub ncdm_favored: bool,
    pub was_fuzzed: bool,
    pub fuzz_level: u32,
    pub has_new_cov: bool,
    /// Number of other queue entries sharing `input_hash`.
    pub duplicates: u32,
}

impl QueueEntry {
    pub(crate) fn apply_calibration(&mut self, cal: &Calibration) {
        self.cal_failed = cal.cal_failed || cal.fault != Fault::None;
        self.exec_us = cal.exec_us;
        self.exec_cksum = cal.exec_cksum;
        self.bitmap_size = cal.bitmap_size;
        self.handicap = cal.handicap;
    }
}
