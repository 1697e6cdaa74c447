//! # Block Structure
//!
//! A block is a header plus an ordered list of opaque transaction payloads.
//! The chain index never looks inside a transaction; it only needs the
//! header fields that place the block in the tree and weigh it.
//!
//! ## Block Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  BlockHeader                                │
//! │  ├── parent_hash: [u8; 32]                  │
//! │  ├── number: Option<u64>  (never encoded)   │
//! │  ├── timestamp: u64                         │
//! │  ├── difficulty: U256                       │
//! │  ├── uncles: Vec<[u8; 32]>                  │
//! │  ├── beneficiary: [u8; 20]                  │
//! │  ├── state_root: [u8; 32]                   │
//! │  ├── tx_root: [u8; 32]   (Merkle root)      │
//! │  └── extra_data: Vec<u8>                    │
//! ├─────────────────────────────────────────────┤
//! │  transactions: Vec<Vec<u8>>                 │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Block Number
//!
//! The number is not part of the encoding. A block only learns its number
//! when the import pipeline finds its parent: `number = parent.number + 1`.
//! Until then it is `None`.
//!
//! ## Identity
//!
//! A block's hash is the BLAKE3 digest of its full encoding (see
//! [`crate::storage::codec`]), so the header carries no hash of its own.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::config::{GENESIS_DIFFICULTY, GENESIS_EXTRA_DATA, GENESIS_TIMESTAMP};
use crate::crypto::{blake3_hash, BlockHash, ZERO_HASH};
use crate::storage::codec::{BincodeCodec, BlockCodec, CodecError};

// ---------------------------------------------------------------------------
// BlockHeader
// ---------------------------------------------------------------------------

/// Block header: chain linkage, weight, and opaque consensus fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Hash of the parent block. All zeros for genesis.
    pub parent_hash: BlockHash,
    /// Position in the chain, assigned at import. Not encoded.
    #[serde(skip)]
    pub number: Option<u64>,
    /// Unix timestamp (seconds). Strictly greater than the parent's.
    pub timestamp: u64,
    /// Proof-of-work difficulty target this block claims.
    pub difficulty: U256,
    /// Hashes of sibling-of-ancestor blocks claimed as uncles.
    pub uncles: Vec<BlockHash>,
    /// Address credited for producing the block.
    pub beneficiary: [u8; 20],
    /// State root after executing this block. Verified by the state
    /// transition validator, not by the index.
    pub state_root: [u8; 32],
    /// Merkle root of the transaction payloads.
    pub tx_root: [u8; 32],
    /// Free-form producer data.
    pub extra_data: Vec<u8>,
}

impl BlockHeader {
    /// Return the parent hash as a hex string.
    pub fn parent_hash_hex(&self) -> String {
        hex::encode(self.parent_hash)
    }

    /// `true` for a header with no parent.
    pub fn is_genesis(&self) -> bool {
        self.parent_hash == ZERO_HASH
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A full block: header + ordered transaction payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Vec<u8>>,
}

impl Block {
    /// Construct the genesis block.
    ///
    /// Zero parent, timestamp [`GENESIS_TIMESTAMP`], difficulty
    /// [`GENESIS_DIFFICULTY`], no uncles, no transactions. Always number 0.
    pub fn genesis() -> Self {
        Block {
            header: BlockHeader {
                parent_hash: ZERO_HASH,
                number: Some(0),
                timestamp: GENESIS_TIMESTAMP,
                difficulty: U256::from(GENESIS_DIFFICULTY),
                uncles: Vec::new(),
                beneficiary: [0u8; 20],
                state_root: blake3_hash(GENESIS_EXTRA_DATA),
                tx_root: [0u8; 32],
                extra_data: GENESIS_EXTRA_DATA.to_vec(),
            },
            transactions: Vec::new(),
        }
    }

    /// Encode with the default codec.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        BincodeCodec.encode(self)
    }

    /// Hash of the default encoding.
    pub fn hash(&self) -> Result<BlockHash, CodecError> {
        Ok(blake3_hash(&self.to_bytes()?))
    }

    /// Check that the block is internally coherent.
    ///
    /// This covers what can be checked without any ancestry:
    ///
    /// 1. The stored `tx_root` matches the recomputed Merkle root.
    /// 2. A block with a zero parent is not claiming uncles.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string on any mismatch.
    pub fn verify_internals(&self) -> Result<(), String> {
        let expected_tx_root = compute_merkle_root(&self.transactions);
        if self.header.tx_root != expected_tx_root {
            return Err(format!(
                "tx_root mismatch: stored={}, computed={}",
                hex::encode(self.header.tx_root),
                hex::encode(expected_tx_root),
            ));
        }

        if self.header.is_genesis() && !self.header.uncles.is_empty() {
            return Err("parentless block must not claim uncles".to_string());
        }

        Ok(())
    }

    /// Return the number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

// ---------------------------------------------------------------------------
// BlockBuilder
// ---------------------------------------------------------------------------

/// Fluent constructor for child blocks.
///
/// Defaults: timestamp one second after the parent, genesis difficulty, no
/// uncles, no transactions. `build()` fills in the transaction root.
///
/// ```
/// use strata_protocol::storage::{Block, BlockBuilder};
///
/// let genesis = Block::genesis();
/// let child = BlockBuilder::on(&genesis).unwrap().extra_data(b"b1").build();
/// assert_eq!(child.header.timestamp, genesis.header.timestamp + 1);
/// ```
#[derive(Debug, Clone)]
pub struct BlockBuilder {
    header: BlockHeader,
    transactions: Vec<Vec<u8>>,
}

impl BlockBuilder {
    /// Start a block extending the parent with the given hash and timestamp.
    pub fn child_of(parent_hash: BlockHash, parent_timestamp: u64) -> Self {
        Self {
            header: BlockHeader {
                parent_hash,
                number: None,
                timestamp: parent_timestamp.saturating_add(1),
                difficulty: U256::from(GENESIS_DIFFICULTY),
                uncles: Vec::new(),
                beneficiary: [0u8; 20],
                state_root: [0u8; 32],
                tx_root: [0u8; 32],
                extra_data: Vec::new(),
            },
            transactions: Vec::new(),
        }
    }

    /// Start a block extending `parent`, hashing it with the default codec.
    pub fn on(parent: &Block) -> Result<Self, CodecError> {
        Ok(Self::child_of(parent.hash()?, parent.header.timestamp))
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.header.timestamp = timestamp;
        self
    }

    pub fn difficulty<D: Into<U256>>(mut self, difficulty: D) -> Self {
        self.header.difficulty = difficulty.into();
        self
    }

    pub fn uncle(mut self, uncle: BlockHash) -> Self {
        self.header.uncles.push(uncle);
        self
    }

    pub fn beneficiary(mut self, beneficiary: [u8; 20]) -> Self {
        self.header.beneficiary = beneficiary;
        self
    }

    pub fn state_root(mut self, state_root: [u8; 32]) -> Self {
        self.header.state_root = state_root;
        self
    }

    /// Distinguishes otherwise identical siblings.
    pub fn extra_data(mut self, data: &[u8]) -> Self {
        self.header.extra_data = data.to_vec();
        self
    }

    pub fn transaction(mut self, payload: Vec<u8>) -> Self {
        self.transactions.push(payload);
        self
    }

    pub fn build(mut self) -> Block {
        self.header.tx_root = compute_merkle_root(&self.transactions);
        Block {
            header: self.header,
            transactions: self.transactions,
        }
    }
}

// ---------------------------------------------------------------------------
// Merkle Tree
// ---------------------------------------------------------------------------

/// Compute a binary Merkle root over the transaction payloads.
///
/// Leaves are `BLAKE3(payload)`, internal nodes `BLAKE3(left || right)`.
/// An odd node at the end of a level is paired with itself. An empty list
/// produces all zeros.
pub fn compute_merkle_root(transactions: &[Vec<u8>]) -> [u8; 32] {
    if transactions.is_empty() {
        return [0u8; 32];
    }

    let mut hashes: Vec<[u8; 32]> = transactions.iter().map(|tx| blake3_hash(tx)).collect();

    while hashes.len() > 1 {
        let mut next_level = Vec::with_capacity((hashes.len() + 1) / 2);
        for chunk in hashes.chunks(2) {
            let right = chunk.get(1).unwrap_or(&chunk[0]);
            let mut combined = Vec::with_capacity(64);
            combined.extend_from_slice(&chunk[0]);
            combined.extend_from_slice(right);
            next_level.push(blake3_hash(&combined));
        }
        hashes = next_level;
    }

    hashes[0]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_block_properties() {
        let genesis = Block::genesis();
        assert_eq!(genesis.header.number, Some(0));
        assert_eq!(genesis.header.parent_hash, ZERO_HASH);
        assert_eq!(genesis.header.timestamp, GENESIS_TIMESTAMP);
        assert_eq!(genesis.header.difficulty, U256::from(GENESIS_DIFFICULTY));
        assert!(genesis.transactions.is_empty());
        assert!(genesis.header.is_genesis());
    }

    #[test]
    fn genesis_verifies_and_hash_is_deterministic() {
        let g1 = Block::genesis();
        let g2 = Block::genesis();
        assert!(g1.verify_internals().is_ok());
        assert_eq!(g1.hash().unwrap(), g2.hash().unwrap());
    }

    #[test]
    fn builder_links_to_parent() {
        let genesis = Block::genesis();
        let child = BlockBuilder::on(&genesis).unwrap().build();

        assert_eq!(child.header.parent_hash, genesis.hash().unwrap());
        assert_eq!(child.header.timestamp, 1);
        assert_eq!(child.header.number, None);
        assert!(child.verify_internals().is_ok());
    }

    #[test]
    fn siblings_with_different_extra_data_differ() {
        let genesis = Block::genesis();
        let a = BlockBuilder::on(&genesis).unwrap().extra_data(b"a").build();
        let b = BlockBuilder::on(&genesis).unwrap().extra_data(b"b").build();
        assert_ne!(a.hash().unwrap(), b.hash().unwrap());
    }

    #[test]
    fn tampered_tx_root_fails_verification() {
        let genesis = Block::genesis();
        let mut block = BlockBuilder::on(&genesis)
            .unwrap()
            .transaction(b"pay alice".to_vec())
            .build();
        assert!(block.verify_internals().is_ok());

        block.header.tx_root[0] ^= 0xFF;
        assert!(block.verify_internals().is_err());
    }

    #[test]
    fn parentless_block_with_uncles_is_incoherent() {
        let mut block = Block::genesis();
        block.header.uncles.push([1u8; 32]);
        assert!(block.verify_internals().is_err());
    }

    #[test]
    fn merkle_root_empty_and_single() {
        assert_eq!(compute_merkle_root(&[]), [0u8; 32]);
        let tx = b"tx".to_vec();
        assert_eq!(compute_merkle_root(&[tx.clone()]), blake3_hash(&tx));
    }

    #[test]
    fn merkle_root_order_sensitive() {
        let a = b"a".to_vec();
        let b = b"b".to_vec();
        assert_ne!(
            compute_merkle_root(&[a.clone(), b.clone()]),
            compute_merkle_root(&[b, a]),
        );
    }

    #[test]
    fn merkle_root_odd_count_pairs_last_with_itself() {
        let txs = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
        let ab = {
            let mut v = blake3_hash(b"a").to_vec();
            v.extend_from_slice(&blake3_hash(b"b"));
            blake3_hash(&v)
        };
        let cc = {
            let mut v = blake3_hash(b"c").to_vec();
            v.extend_from_slice(&blake3_hash(b"c"));
            blake3_hash(&v)
        };
        let mut top = ab.to_vec();
        top.extend_from_slice(&cc);
        assert_eq!(compute_merkle_root(&txs), blake3_hash(&top));
    }

    #[test]
    fn number_is_not_encoded() {
        let genesis = Block::genesis();
        let mut numbered = BlockBuilder::on(&genesis).unwrap().build();
        let unnumbered = numbered.clone();
        numbered.header.number = Some(1);
        assert_eq!(numbered.to_bytes().unwrap(), unnumbered.to_bytes().unwrap());
    }
}
