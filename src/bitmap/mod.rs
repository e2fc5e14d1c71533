//! Trace-map primitives: hit-count classification, population counts,
//! novelty detection against the virgin maps, and bit-minimization into the
//! compact edge-presence vectors the diversity machinery works on.

pub mod classify;
pub mod count;
pub mod minimize;
pub mod novelty;

pub use classify::{bucket_of, simplify_trace, Classifier, COUNT_CLASS_LOOKUP8};
pub use count::{count_bits, count_bytes, count_non_255_bytes};
pub use minimize::{contains_new_coverage, count_mini_bits, minimize_bits, or_into, trace_minis_differ};
pub use novelty::{has_new_bits, has_new_bits_unclassified, skim, NewCoverage};
