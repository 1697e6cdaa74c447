//! # Hashing Primitives
//!
//! Everything in the chain index is addressed by a 32-byte BLAKE3 digest.
//! This module owns that identifier and the few helpers that produce and
//! print it.

pub mod hash;

pub use hash::{blake3_hash, hash_from_hex, short_hex, BlockHash, ZERO_HASH};
