//! # Block Validation
//!
//! Pure checks on a candidate block. Nothing here touches the disk or
//! mutates the index; given the same inputs the answer is always the same,
//! which is what lets validation run outside the engine's writer lock.
//!
//! ## Check Order
//!
//! ```text
//! structure ─► parent known? ─► timestamp ─► difficulty ─► uncles ─► state
//!   reject        defer          reject        reject     reject/defer reject
//! ```
//!
//! The order matters. A block with a bad timestamp is rejected even if one
//! of its uncles is unknown, so the timestamp verdict never depends on
//! arrival order. Within the uncle check, every uncle must be known before
//! any of them is judged: one unknown uncle defers the whole block.
//!
//! ## Collaborators
//!
//! Difficulty arithmetic and state execution belong to other subsystems.
//! They plug in through [`DifficultyPolicy`] and [`StateTransitionValidator`].

use std::collections::HashSet;
use std::sync::Arc;

use primitive_types::U256;

use super::error::{DeferReason, ImportOutcome, RejectReason};
use crate::config::EngineConfig;
use crate::storage::{AncestryEntry, AncestryIndex, Block, BlockHeader};

// ---------------------------------------------------------------------------
// Collaborator Traits
// ---------------------------------------------------------------------------

/// Decides whether a block's difficulty is consistent with its parent.
pub trait DifficultyPolicy: Send + Sync {
    fn is_valid(&self, candidate: &BlockHeader, parent: &BlockHeader) -> bool;
}

/// Accepts every difficulty. Useful when difficulty is checked elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyDifficulty;

impl DifficultyPolicy for AnyDifficulty {
    fn is_valid(&self, _candidate: &BlockHeader, _parent: &BlockHeader) -> bool {
        true
    }
}

/// Accepts any difficulty at or above a floor.
#[derive(Debug, Clone, Copy)]
pub struct MinimumDifficulty(pub U256);

impl DifficultyPolicy for MinimumDifficulty {
    fn is_valid(&self, candidate: &BlockHeader, _parent: &BlockHeader) -> bool {
        candidate.difficulty >= self.0
    }
}

/// Executes a block's transactions and checks the resulting state root.
pub trait StateTransitionValidator: Send + Sync {
    fn validate(&self, block: &Block) -> bool;
}

/// Accepts every block. The default until an execution layer is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllStates;

impl StateTransitionValidator for AcceptAllStates {
    fn validate(&self, _block: &Block) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// ValidationRules
// ---------------------------------------------------------------------------

/// Everything validation needs besides the block and the index.
#[derive(Clone)]
pub struct ValidationRules {
    pub max_uncles: usize,
    pub difficulty: Arc<dyn DifficultyPolicy>,
    pub state: Arc<dyn StateTransitionValidator>,
}

impl ValidationRules {
    /// Rules derived from the engine config with the default collaborators.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_uncles: config.max_uncles,
            difficulty: Arc::new(MinimumDifficulty(U256::from(config.min_difficulty))),
            state: Arc::new(AcceptAllStates),
        }
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl std::fmt::Debug for ValidationRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationRules")
            .field("max_uncles", &self.max_uncles)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ValidationFailure
// ---------------------------------------------------------------------------

/// A failed check: either come back later or don't come back at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    Defer(DeferReason),
    Reject(RejectReason),
}

impl From<ValidationFailure> for ImportOutcome {
    fn from(failure: ValidationFailure) -> Self {
        match failure {
            ValidationFailure::Defer(reason) => ImportOutcome::Deferred(reason),
            ValidationFailure::Reject(reason) => ImportOutcome::Rejected(reason),
        }
    }
}

impl From<RejectReason> for ValidationFailure {
    fn from(reason: RejectReason) -> Self {
        Self::Reject(reason)
    }
}

impl From<DeferReason> for ValidationFailure {
    fn from(reason: DeferReason) -> Self {
        Self::Defer(reason)
    }
}

// ---------------------------------------------------------------------------
// Individual Checks
// ---------------------------------------------------------------------------

/// The block must be internally coherent (transaction root, no uncles on a
/// parentless block).
pub fn check_structure(block: &Block) -> Result<(), RejectReason> {
    block.verify_internals().map_err(RejectReason::MalformedBlock)
}

/// Find the candidate's parent in the index, or defer.
pub fn resolve_parent<'a>(
    header: &BlockHeader,
    index: &'a AncestryIndex,
) -> Result<&'a AncestryEntry, DeferReason> {
    index
        .lookup(&header.parent_hash)
        .ok_or(DeferReason::UnknownParent(header.parent_hash))
}

/// `number := parent.number + 1`.
pub fn assign_number(header: &mut BlockHeader, parent: &AncestryEntry) -> u64 {
    let number = parent.number + 1;
    header.number = Some(number);
    number
}

/// Timestamps strictly increase along every chain.
pub fn check_timestamp(candidate: &BlockHeader, parent: &BlockHeader) -> Result<(), RejectReason> {
    if candidate.timestamp <= parent.timestamp {
        return Err(RejectReason::InvalidTimestamp {
            parent: parent.timestamp,
            block: candidate.timestamp,
        });
    }
    Ok(())
}

/// Delegate to the difficulty policy.
pub fn check_difficulty(
    candidate: &BlockHeader,
    parent: &BlockHeader,
    policy: &dyn DifficultyPolicy,
) -> Result<(), RejectReason> {
    if !policy.is_valid(candidate, parent) {
        return Err(RejectReason::InvalidDifficulty);
    }
    Ok(())
}

/// Uncles must be known siblings of the candidate: blocks whose recorded
/// parent is the candidate's own parent.
///
/// Structural problems (too many, duplicates) reject first. Then every
/// uncle must be known, or the block is deferred. Only then is each uncle's
/// parent compared.
pub fn check_uncles(
    candidate: &BlockHeader,
    index: &AncestryIndex,
    max_uncles: usize,
) -> Result<(), ValidationFailure> {
    if candidate.uncles.len() > max_uncles {
        let first_extra = candidate.uncles[max_uncles];
        return Err(RejectReason::InvalidUncle {
            uncle: first_extra,
            reason: format!("{} uncles exceeds limit of {}", candidate.uncles.len(), max_uncles),
        }
        .into());
    }

    let mut seen = HashSet::with_capacity(candidate.uncles.len());
    for uncle in &candidate.uncles {
        if !seen.insert(*uncle) {
            return Err(RejectReason::InvalidUncle {
                uncle: *uncle,
                reason: "listed more than once".to_string(),
            }
            .into());
        }
    }

    let mut entries = Vec::with_capacity(candidate.uncles.len());
    for uncle in &candidate.uncles {
        match index.lookup(uncle) {
            Some(entry) => entries.push((uncle, entry)),
            None => return Err(DeferReason::UnknownUncle(*uncle).into()),
        }
    }

    for (uncle, entry) in entries {
        if entry.parent_hash != candidate.parent_hash {
            return Err(RejectReason::InvalidUncle {
                uncle: *uncle,
                reason: format!(
                    "uncle parent {} differs from block parent {}",
                    crate::crypto::short_hex(&entry.parent_hash),
                    crate::crypto::short_hex(&candidate.parent_hash),
                ),
            }
            .into());
        }
    }

    Ok(())
}

/// Delegate to the state transition validator.
pub fn check_state(block: &Block, validator: &dyn StateTransitionValidator) -> Result<(), RejectReason> {
    if !validator.validate(block) {
        return Err(RejectReason::InvalidStateTransition);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Full Validation
// ---------------------------------------------------------------------------

/// Run every ancestry-relative check on a block whose parent is known.
///
/// `parent` is the decoded parent header. Structure and the parent lookup
/// are the caller's job; they happen before the parent can be loaded.
pub fn validate_block(
    block: &Block,
    parent: &BlockHeader,
    index: &AncestryIndex,
    rules: &ValidationRules,
) -> Result<(), ValidationFailure> {
    check_timestamp(&block.header, parent)?;
    check_difficulty(&block.header, parent, rules.difficulty.as_ref())?;
    check_uncles(&block.header, index, rules.max_uncles)?;
    check_state(block, rules.state.as_ref())?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
