//! Diversity-driven corpus management core for instrumented greybox fuzzing.
//!
//! The fuzzing loop runs a target under a shared-memory coverage map and, for
//! each execution, asks this crate whether the input should be retained,
//! whether an existing corpus member should be evicted in its favour, and
//! where the input is filed in the per-edge index. Retention is driven by
//! coverage novelty plus a per-(edge, bucket) bounded-diversity queue scored
//! with a multi-set Normalized Compression Distance (or pairwise normalized
//! Levenshtein).
//!
//! Mutation scheduling, the forkserver, CLI and crash triage are external
//! collaborators; the seam to the target runner is the
//! [`TargetRunner`](exec::TargetRunner) trait.

// The coverage scan walks the trace map in 64-bit words.
#[cfg(not(target_pointer_width = "64"))]
compile_error!("ncdfuzz supports 64-bit targets only");

pub mod bitmap;
pub mod config;
pub mod display;
pub mod diversity;
pub mod exec;
pub mod hash;
pub mod queue;
pub mod save;
pub mod state;
pub mod timefn;

// ── Primary entry points ─────────────────────────────────────────────────────

/// Per-execution decision pipeline.
pub use save::save_if_interesting;

/// Greedy diversity-maximizing coverage cover over the queue.
pub use queue::favored::set_ncdm_favored;

// ── Core types ───────────────────────────────────────────────────────────────

pub use diversity::{DiversityMetric, MetricKind, PayloadKind};
pub use exec::{Calibration, Fault, TargetRunner};
pub use queue::{EdgeCell, EdgeIndex, EntryId, InputHashError, InputHashIndex, Queue, QueueEntry};
pub use save::descriptor::{OpContext, StageValType};
pub use save::partitions::PathPartitionIndex;
pub use state::{CorpusSettings, CorpusState, HashfuzzSettings};

// ── Coverage primitives re-exported for embedders and tools ─────────────────

pub use bitmap::{
    count_bits, count_bytes, count_non_255_bytes, has_new_bits, minimize_bits, simplify_trace,
    skim, Classifier, NewCoverage,
};
