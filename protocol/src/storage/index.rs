//! # Ancestry Index
//!
//! The in-memory shape of the block tree. Every known block has exactly one
//! [`AncestryEntry`] (its number, its parent, and the weight data fork
//! choice needs) and appears in its parent's child set.
//!
//! The index is arena-style: there are no pointers between entries, only
//! hash lookups. That keeps it trivially serializable, which is how it
//! survives restarts (see [`crate::storage::db`]).
//!
//! Entries are write-once. A block is never re-parented and its number
//! never changes, so there is no update operation.

use std::collections::{HashMap, HashSet};

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::crypto::{short_hex, BlockHash};

/// Index-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// The block is already indexed. Re-delivery is normal; callers treat
    /// this as a no-op.
    #[error("block {} already indexed", short_hex(.0))]
    DuplicateBlock(BlockHash),
}

/// What the index remembers about one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestryEntry {
    /// Distance from genesis.
    pub number: u64,
    /// Parent block hash. Zero for genesis.
    pub parent_hash: BlockHash,
    /// The block's own difficulty.
    pub difficulty: U256,
    /// Uncles this block was accepted with.
    pub uncles: Vec<BlockHash>,
}

/// Block hash → entry, plus the reverse parent → children map.
#[derive(Debug, Clone, Default)]
pub struct AncestryIndex {
    entries: HashMap<BlockHash, AncestryEntry>,
    children: HashMap<BlockHash, HashSet<BlockHash>>,
}

impl AncestryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild both maps from a set of entries, in any order.
    ///
    /// Duplicate hashes keep the first entry seen.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (BlockHash, AncestryEntry)>,
    {
        let mut index = Self::new();
        for (hash, entry) in entries {
            // A duplicate here means the same key was yielded twice; the
            // entries are immutable, so the first one is as good as any.
            let _ = index.insert(hash, entry);
        }
        index
    }

    /// Look up a block's entry.
    pub fn lookup(&self, hash: &BlockHash) -> Option<&AncestryEntry> {
        self.entries.get(hash)
    }

    /// Is this block known?
    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.entries.contains_key(hash)
    }

    /// Record a newly imported block and link it under its parent.
    pub fn insert(&mut self, hash: BlockHash, entry: AncestryEntry) -> Result<(), IndexError> {
        if self.entries.contains_key(&hash) {
            return Err(IndexError::DuplicateBlock(hash));
        }
        self.children.entry(entry.parent_hash).or_default().insert(hash);
        self.entries.insert(hash, entry);
        Ok(())
    }

    /// Known children of a block. Empty for leaves and unknown hashes.
    pub fn children_of(&self, hash: &BlockHash) -> HashSet<BlockHash> {
        self.children.get(hash).cloned().unwrap_or_default()
    }

    /// Known blocks with no known children: the current chain heads.
    pub fn heads(&self) -> Vec<BlockHash> {
        self.entries
            .keys()
            .filter(|hash| self.children.get(*hash).map_or(true, |c| c.is_empty()))
            .copied()
            .collect()
    }

    /// Number of known blocks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over every known block.
    pub fn iter(&self) -> impl Iterator<Item = (&BlockHash, &AncestryEntry)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ZERO_HASH;

    fn entry(number: u64, parent: BlockHash) -> AncestryEntry {
        AncestryEntry {
            number,
            parent_hash: parent,
            difficulty: U256::from(10u64),
            uncles: Vec::new(),
        }
    }

    #[test]
    fn insert_and_lookup() {
        let mut index = AncestryIndex::new();
        index.insert([1; 32], entry(0, ZERO_HASH)).unwrap();
        index.insert([2; 32], entry(1, [1; 32])).unwrap();

        assert_eq!(index.lookup(&[2; 32]).unwrap().number, 1);
        assert_eq!(index.lookup(&[2; 32]).unwrap().parent_hash, [1; 32]);
        assert!(index.lookup(&[3; 32]).is_none());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn duplicate_insert_fails_and_leaves_state_alone() {
        let mut index = AncestryIndex::new();
        index.insert([1; 32], entry(0, ZERO_HASH)).unwrap();

        let err = index.insert([1; 32], entry(5, [9; 32])).unwrap_err();
        assert_eq!(err, IndexError::DuplicateBlock([1; 32]));
        assert_eq!(index.lookup(&[1; 32]).unwrap().number, 0);
        assert!(index.children_of(&[9; 32]).is_empty());
    }

    #[test]
    fn children_tracks_siblings() {
        let mut index = AncestryIndex::new();
        index.insert([1; 32], entry(0, ZERO_HASH)).unwrap();
        index.insert([2; 32], entry(1, [1; 32])).unwrap();
        index.insert([3; 32], entry(1, [1; 32])).unwrap();

        let children = index.children_of(&[1; 32]);
        assert_eq!(children.len(), 2);
        assert!(children.contains(&[2; 32]));
        assert!(children.contains(&[3; 32]));
        assert!(index.children_of(&[2; 32]).is_empty());
    }

    #[test]
    fn heads_are_leaves() {
        let mut index = AncestryIndex::new();
        index.insert([1; 32], entry(0, ZERO_HASH)).unwrap();
        index.insert([2; 32], entry(1, [1; 32])).unwrap();
        index.insert([3; 32], entry(1, [1; 32])).unwrap();
        index.insert([4; 32], entry(2, [2; 32])).unwrap();

        let mut heads = index.heads();
        heads.sort();
        assert_eq!(heads, vec![[3; 32], [4; 32]]);
    }

    #[test]
    fn rebuild_from_unordered_entries() {
        let entries = vec![
            ([4; 32], entry(2, [2; 32])),
            ([2; 32], entry(1, [1; 32])),
            ([1; 32], entry(0, ZERO_HASH)),
        ];
        let index = AncestryIndex::from_entries(entries);

        assert_eq!(index.len(), 3);
        assert!(index.children_of(&[2; 32]).contains(&[4; 32]));
        assert!(index.children_of(&[1; 32]).contains(&[2; 32]));
    }
}
