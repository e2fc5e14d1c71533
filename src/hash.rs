//! Thin wrapper around the `xxhash-rust` crate providing the XXH64 API used
//! by the rest of this crate.
//!
//! Only XXH64 is needed: testcase content hashes and classified-trace
//! checksums both use the one-shot 64-bit form with the fixed seed
//! [`HASH_CONST`].

use crate::config::HASH_CONST;

/// One-shot XXH64 hash.
#[inline]
pub fn hash64(data: &[u8], seed: u64) -> u64 {
    xxhash_rust::xxh64::xxh64(data, seed)
}

/// Content hash of a testcase, seeded with [`HASH_CONST`].
#[inline]
pub fn input_hash(data: &[u8]) -> u64 {
    hash64(data, HASH_CONST)
}
