//! # Heaviest-Branch Fork Choice
//!
//! Picks the canonical chain among competing branches.
//!
//! ## Problem
//!
//! "Longest chain" counts blocks, and block count is cheap to fake with a
//! run of low-difficulty blocks. What should win is the branch with the
//! most work behind it.
//!
//! ## Rule
//!
//! The weight of a block is its own difficulty plus a bonus for each uncle
//! it includes (a fraction of the uncle's difficulty, see [`UncleBonus`]).
//! The weight of a branch is the sum of its blocks' weights.
//!
//! When a block arrives, both the current tip and the candidate are walked
//! back to their common ancestor, and the two branches are weighed from
//! that ancestor forward. The tip moves only if the candidate's branch is
//! strictly heavier. Equal weight keeps the current tip, so replicas don't
//! flap between equally good branches.
//!
//! ```text
//!            ┌── a1 ── a2          (current tip: a2)
//!   ancestor ┤
//!            └── b1 ── b2 ── b3    (candidate: b3)
//!
//!   weight(a1..a2) vs weight(b1..b3)
//! ```
//!
//! Everything is a hash lookup into the [`AncestryIndex`]; there is no
//! pointer graph to keep consistent.

use std::collections::{HashMap, VecDeque};

use primitive_types::U256;

use crate::config::UncleBonus;
use crate::crypto::{short_hex, BlockHash};
use crate::storage::{AncestryEntry, AncestryIndex};

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// The blocks that leave and join the canonical chain when the tip moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRoute {
    /// Last block shared by the old and new chains.
    pub common_ancestor: BlockHash,
    /// Old-chain blocks above the ancestor, old tip first.
    pub retracted: Vec<BlockHash>,
    /// New-chain blocks above the ancestor, oldest first (ends at the new tip).
    pub enacted: Vec<BlockHash>,
}

impl TreeRoute {
    /// A plain extension of the current chain retracts nothing.
    pub fn is_reorg(&self) -> bool {
        !self.retracted.is_empty()
    }
}

/// What fork choice wants done with the tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The current tip stays.
    Keep,
    /// Move the tip to the candidate along this route.
    Switch(TreeRoute),
}

/// Fork choice needed an entry that is not in the index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ancestor {} missing from index", short_hex(.0))]
pub struct MissingAncestor(pub BlockHash);

// ---------------------------------------------------------------------------
// ForkChoice
// ---------------------------------------------------------------------------

/// Heaviest-branch resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForkChoice {
    bonus: UncleBonus,
}

impl ForkChoice {
    pub fn new(bonus: UncleBonus) -> Self {
        Self { bonus }
    }

    /// Weight contributed by one block: its difficulty plus the uncle bonus.
    ///
    /// Uncles missing from the index contribute nothing. After validation
    /// that cannot happen, but weighing must not fail because of it.
    pub fn block_weight(&self, entry: &AncestryEntry, index: &AncestryIndex) -> U256 {
        entry.uncles.iter().fold(entry.difficulty, |acc, uncle| {
            let bonus = index
                .lookup(uncle)
                .map(|u| self.bonus.apply(u.difficulty))
                .unwrap_or_default();
            acc.saturating_add(bonus)
        })
    }

    /// Decide whether `candidate` should replace `tip`.
    ///
    /// `candidate_entry` is passed separately because fork choice runs
    /// before the candidate is committed to the index.
    pub fn resolve(
        &self,
        index: &AncestryIndex,
        tip: &BlockHash,
        candidate: &BlockHash,
        candidate_entry: &AncestryEntry,
    ) -> Result<Decision, MissingAncestor> {
        let view = PendingView {
            index,
            pending: (candidate, candidate_entry),
        };

        let mut old = *tip;
        let mut old_entry = view.get(&old)?;
        let mut old_weight = U256::zero();
        let mut retracted = Vec::new();

        let mut new = *candidate;
        let mut new_entry = candidate_entry;
        let mut new_weight = U256::zero();
        let mut enacted = Vec::new();

        while old_entry.number > new_entry.number {
            old_weight = old_weight.saturating_add(self.block_weight(old_entry, index));
            retracted.push(old);
            old = old_entry.parent_hash;
            old_entry = view.get(&old)?;
        }

        while new_entry.number > old_entry.number {
            new_weight = new_weight.saturating_add(self.block_weight(new_entry, index));
            enacted.push(new);
            new = new_entry.parent_hash;
            new_entry = view.get(&new)?;
        }

        while old != new {
            old_weight = old_weight.saturating_add(self.block_weight(old_entry, index));
            retracted.push(old);
            old = old_entry.parent_hash;
            old_entry = view.get(&old)?;

            new_weight = new_weight.saturating_add(self.block_weight(new_entry, index));
            enacted.push(new);
            new = new_entry.parent_hash;
            new_entry = view.get(&new)?;
        }

        if new_weight <= old_weight {
            tracing::trace!(
                tip = %short_hex(tip),
                candidate = %short_hex(candidate),
                %old_weight,
                %new_weight,
                "fork choice keeps tip"
            );
            return Ok(Decision::Keep);
        }

        enacted.reverse();
        Ok(Decision::Switch(TreeRoute {
            common_ancestor: old,
            retracted,
            enacted,
        }))
    }

    /// Cumulative weight of the chain from genesis to `head`, inclusive.
    pub fn total_weight(
        &self,
        index: &AncestryIndex,
        head: &BlockHash,
    ) -> Result<U256, MissingAncestor> {
        let mut total = U256::zero();
        let mut cursor = *head;
        loop {
            let entry = index.lookup(&cursor).ok_or(MissingAncestor(cursor))?;
            total = total.saturating_add(self.block_weight(entry, index));
            if entry.number == 0 {
                return Ok(total);
            }
            cursor = entry.parent_hash;
        }
    }

    /// Pick the heaviest head of the whole tree, from scratch.
    ///
    /// Weights are accumulated breadth-first from genesis. Equal-weight
    /// heads resolve to the lowest hash so every replica picks the same one.
    pub fn heaviest_head(&self, index: &AncestryIndex, genesis: &BlockHash) -> BlockHash {
        let genesis_weight = index
            .lookup(genesis)
            .map(|e| self.block_weight(e, index))
            .unwrap_or_default();

        let mut totals: HashMap<BlockHash, U256> = HashMap::with_capacity(index.len());
        totals.insert(*genesis, genesis_weight);

        let mut best: Option<(BlockHash, U256)> = None;
        let mut queue = VecDeque::from([*genesis]);

        while let Some(hash) = queue.pop_front() {
            let total = totals.get(&hash).copied().unwrap_or_default();
            let children = index.children_of(&hash);

            if children.is_empty() {
                let better = match best {
                    None => true,
                    Some((best_hash, best_total)) => {
                        total > best_total || (total == best_total && hash < best_hash)
                    }
                };
                if better {
                    best = Some((hash, total));
                }
                continue;
            }

            for child in children {
                let Some(entry) = index.lookup(&child) else {
                    continue;
                };
                totals.insert(child, total.saturating_add(self.block_weight(entry, index)));
                queue.push_back(child);
            }
        }

        best.map_or(*genesis, |(hash, _)| hash)
    }
}

/// The index plus one not-yet-inserted entry.
struct PendingView<'a> {
    index: &'a AncestryIndex,
    pending: (&'a BlockHash, &'a AncestryEntry),
}

impl<'a> PendingView<'a> {
    fn get(&self, hash: &BlockHash) -> Result<&'a AncestryEntry, MissingAncestor> {
        if hash == self.pending.0 {
            return Ok(self.pending.1);
        }
        self.index.lookup(hash).ok_or(MissingAncestor(*hash))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
