//! # Block Codec
//!
//! The seam between raw bytes and [`Block`]. The import pipeline only ever
//! talks to the [`BlockCodec`] trait, so a node speaking a different wire
//! format plugs in its own codec without touching validation or storage.
//!
//! [`BincodeCodec`] is the default: bincode for the encoding, BLAKE3 over
//! the full encoding for the identity.

use bincode::Options;

use super::block::Block;
use crate::crypto::{blake3_hash, BlockHash};

/// Decoding failures. Anything that cannot be turned into a block is
/// malformed; the codec doesn't distinguish further.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed block: {0}")]
    Malformed(String),

    #[error("failed to encode block: {0}")]
    Encode(String),
}

/// Converts between raw block bytes and structured blocks.
pub trait BlockCodec: Send + Sync {
    /// Decode raw bytes into a block. Truncated input, trailing garbage and
    /// invalid field encodings are all [`CodecError::Malformed`].
    fn decode(&self, raw: &[u8]) -> Result<Block, CodecError>;

    /// Encode a block into its canonical byte form.
    fn encode(&self, block: &Block) -> Result<Vec<u8>, CodecError>;

    /// Content hash of raw block bytes.
    fn hash(&self, raw: &[u8]) -> BlockHash;
}

/// bincode encoding with BLAKE3 identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    /// Fixed-width integers, little-endian, no trailing bytes. The
    /// encoding must be canonical: one block, one byte string, one hash.
    fn options() -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_little_endian()
            .reject_trailing_bytes()
    }
}

impl BlockCodec for BincodeCodec {
    fn decode(&self, raw: &[u8]) -> Result<Block, CodecError> {
        Self::options()
            .deserialize(raw)
            .map_err(|e| CodecError::Malformed(e.to_string()))
    }

    fn encode(&self, block: &Block) -> Result<Vec<u8>, CodecError> {
        Self::options()
            .serialize(block)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn hash(&self, raw: &[u8]) -> BlockHash {
        blake3_hash(raw)
    }
}
