//! # Hashing Utilities
//!
//! Blocks are content-addressed: a block's identity is the BLAKE3 digest of
//! its complete raw encoding. BLAKE3 gives 128-bit collision resistance with
//! a 256-bit output and is fast enough that hashing every received block is
//! noise next to the disk write that follows.
//!
//! Hashes are stored and compared as plain `[u8; 32]` arrays. When they hit
//! the sled keyspace they are written as-is, which is the fixed-width
//! big-endian encoding of the 256-bit value.

/// A 256-bit block identifier.
pub type BlockHash = [u8; 32];

/// The all-zero hash. Used as the parent of the genesis block.
pub const ZERO_HASH: BlockHash = [0u8; 32];

/// Number of hex characters shown by [`short_hex`].
const SHORT_HEX_LEN: usize = 12;

/// Compute the BLAKE3 hash of the input data.
///
/// # Example
///
/// ```
/// use strata_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"strata");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> BlockHash {
    *blake3::hash(data).as_bytes()
}

/// Abbreviated hex form of a hash for log lines.
///
/// Full 64-character hashes make logs unreadable; twelve characters are
/// plenty to tell blocks apart by eye.
pub fn short_hex(hash: &BlockHash) -> String {
    let mut full = hex::encode(hash);
    full.truncate(SHORT_HEX_LEN);
    full
}

/// Parse a 64-character hex string (optionally `0x`-prefixed) into a hash.
///
/// Returns `None` if the string is not valid hex or not exactly 32 bytes.
pub fn hash_from_hex(s: &str) -> Option<BlockHash> {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits).ok()?;
    bytes.try_into().ok()
}
