// config.rs — Compile-time configuration constants.
//
// Runtime tunables (output directory, map size, metric selection, timeouts)
// live on `state::CorpusSettings`; everything here is fixed at build time.

/// Seed for the 64-bit content hash. Used both for `input_hash` (over
/// testcase bytes) and `exec_cksum` (over the classified trace).
pub const HASH_CONST: u64 = 0xa5b3_5705;

/// Number of logarithmic hit-count buckets per edge.
pub const BUCKET_COUNT: usize = 8;

/// Representatives kept per (edge, bucket) cell when the multi-set
/// compression-distance metric is active.
pub const NCD_ENTRIES_PER_EDGE: usize = 32;

/// Representatives kept per cell under the pairwise Levenshtein metric.
pub const LEV_ENTRIES_PER_EDGE: usize = 2;

/// Cap on saved unique hangs. Timeouts past this point only bump counters.
pub const KEEP_UNIQUE_HANG: u64 = 500;

/// Cap on saved unique crashes.
pub const KEEP_UNIQUE_CRASH: u64 = 10_000;

/// Mode bits for files persisted under the output directory.
#[cfg(unix)]
pub const DEFAULT_PERMISSION: u32 = 0o600;

/// Longest filename component we will emit.
pub const NAME_MAX: usize = 255;
