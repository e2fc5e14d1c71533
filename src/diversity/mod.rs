//! Diversity scoring over sets of queue entries.
//!
//! Two interchangeable scores: multi-set NCD over up to 32 entries, or
//! pairwise normalized Levenshtein over exactly two. The payload fed to the
//! compressor is either the raw testcase bytes or the packed edge-presence
//! vector; both choices share one pair of scratch buffers that grow
//! monotonically and are owned here — constructed once at startup, passed
//! explicitly, never module-level state.

pub mod levenshtein;
pub mod ncd;

use crate::config::{LEV_ENTRIES_PER_EDGE, NCD_ENTRIES_PER_EDGE};

/// Which diversity score the edge index uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Multi-set normalized compression distance, 32 representatives per cell.
    Ncdm,
    /// Pairwise normalized Levenshtein, 2 representatives per cell.
    Levenshtein,
}

/// What gets concatenated and compressed for NCD scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Raw testcase bytes.
    Testcase,
    /// The packed `trace_mini` edge-presence vector.
    TraceMini,
}

/// One member of a set under scoring: its payload bytes plus the cached
/// compressed size of that payload.
#[derive(Debug, Clone, Copy)]
pub struct DiversityItem<'a> {
    pub payload: &'a [u8],
    pub compressed_len: u32,
}

/// Diversity score computer with its reusable compression scratch.
pub struct DiversityMetric {
    metric: MetricKind,
    payload: PayloadKind,
    /// Scratch capacity; always a power of two, never shrinks.
    prev_longest: usize,
    max_compressed_len: usize,
    uncompressed: Vec<u8>,
    compressed: Vec<u8>,
    lev_prev_row: Vec<u32>,
    lev_curr_row: Vec<u32>,
}

impl DiversityMetric {
    /// The Levenshtein metric always scores raw testcase bytes; the payload
    /// selection only affects NCD mode.
    pub fn new(metric: MetricKind, payload: PayloadKind) -> Self {
        let payload = match metric {
            MetricKind::Levenshtein => PayloadKind::Testcase,
            MetricKind::Ncdm => payload,
        };
        DiversityMetric {
            metric,
            payload,
            prev_longest: 0,
            max_compressed_len: 0,
            uncompressed: Vec::new(),
            compressed: Vec::new(),
            lev_prev_row: Vec::new(),
            lev_curr_row: Vec::new(),
        }
    }

    pub fn metric_kind(&self) -> MetricKind {
        self.metric
    }

    pub fn payload_kind(&self) -> PayloadKind {
        self.payload
    }

    /// Cell capacity implied by the metric.
    pub fn entries_per_edge(&self) -> usize {
        match self.metric {
            MetricKind::Ncdm => NCD_ENTRIES_PER_EDGE,
            MetricKind::Levenshtein => LEV_ENTRIES_PER_EDGE,
        }
    }

    /// Current scratch capacity in bytes.
    pub fn scratch_capacity(&self) -> usize {
        self.prev_longest
    }

    /// Compressed size of a single payload, growing the scratch if the
    /// payload would not leave the usual concatenation headroom.
    pub fn compress_len(&mut self, data: &[u8]) -> u32 {
        if 2 * data.len() >= self.prev_longest {
            self.grow_scratch(data.len());
        }
        match lz4_flex::block::compress_into(data, &mut self.compressed) {
            Ok(n) => n as u32,
            Err(e) => crate::fatal!(
                "compression bound exceeded for {} byte payload (scratch {}): {}",
                data.len(),
                self.max_compressed_len,
                e
            ),
        }
    }

    /// Scores a set under the configured metric.
    ///
    /// Levenshtein is only defined for pairs: sets of fewer than two entries
    /// score 0 (a half-filled cell has no diversity yet) and more than two is
    /// a caller bug. NCD handles any count the cells can produce.
    pub fn score_set(&mut self, items: &[DiversityItem<'_>]) -> f32 {
        match self.metric {
            MetricKind::Levenshtein => match items.len() {
                0 | 1 => 0.0,
                2 => levenshtein::normalised_levenshtein(
                    items[0].payload,
                    items[1].payload,
                    &mut self.lev_prev_row,
                    &mut self.lev_curr_row,
                ),
                n => crate::fatal!("need exactly 2 entries for the levenshtein metric, got {n}"),
            },
            MetricKind::Ncdm => self.ncdm(items),
        }
    }

    /// Regrows both scratch buffers for a demand of `sizing` bytes: next
    /// power of two above the demand, times a 4x headroom factor.
    pub(crate) fn grow_scratch(&mut self, sizing: usize) {
        let mut bitcnt = 0u32;
        let mut val = sizing;
        while val > 1 {
            bitcnt += 1;
            val >>= 1;
        }
        self.prev_longest = 1usize << (bitcnt + 2);
        self.uncompressed.resize(self.prev_longest, 0);
        self.max_compressed_len = lz4_flex::block::get_maximum_output_size(self.prev_longest);
        self.compressed.resize(self.max_compressed_len, 0);
    }
}
