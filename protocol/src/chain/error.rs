//! Import outcomes and engine errors.
//!
//! Every import attempt ends in exactly one [`ImportOutcome`]. Problems with
//! the *block* are outcomes (`Rejected`, `Deferred`); problems with the
//! *node* (disk, corrupted store) are [`ChainError`]s. The two are never
//! mixed: a failing disk does not make a block invalid.

use std::fmt;

use super::fork_choice::MissingAncestor;
use crate::config::ConfigError;
use crate::crypto::{short_hex, BlockHash};
use crate::storage::{CodecError, DbError};

// ---------------------------------------------------------------------------
// ImportOutcome
// ---------------------------------------------------------------------------

/// The result of presenting one block to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Validated, persisted, indexed. `canonical` is true when the block
    /// became (or extended) the canonical tip.
    Accepted {
        hash: BlockHash,
        number: u64,
        canonical: bool,
    },

    /// Already in the index. Nothing changed.
    AlreadyKnown(BlockHash),

    /// Refers to a block we have not seen. Not persisted; present it again
    /// once the dependency has been imported.
    Deferred(DeferReason),

    /// Invalid. Not persisted, and presenting it again will not help.
    Rejected(RejectReason),
}

impl ImportOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::AlreadyKnown(_) => "known",
            Self::Deferred(_) => "deferred",
            Self::Rejected(_) => "rejected",
        }
    }
}

impl fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted {
                hash,
                number,
                canonical,
            } => write!(
                f,
                "accepted {} at #{}{}",
                short_hex(hash),
                number,
                if *canonical { " (new tip)" } else { "" }
            ),
            Self::AlreadyKnown(hash) => write!(f, "already known {}", short_hex(hash)),
            Self::Deferred(reason) => write!(f, "deferred: {}", reason),
            Self::Rejected(reason) => write!(f, "rejected: {}", reason),
        }
    }
}

// ---------------------------------------------------------------------------
// DeferReason
// ---------------------------------------------------------------------------

/// Why an import was put off.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeferReason {
    #[error("unknown parent {}", short_hex(.0))]
    UnknownParent(BlockHash),

    #[error("unknown uncle {}", short_hex(.0))]
    UnknownUncle(BlockHash),
}

// ---------------------------------------------------------------------------
// RejectReason
// ---------------------------------------------------------------------------

/// Why a block is invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("malformed block: {0}")]
    MalformedBlock(String),

    #[error("hash mismatch: expected {}, computed {}", short_hex(.expected), short_hex(.computed))]
    HashMismatch {
        expected: BlockHash,
        computed: BlockHash,
    },

    #[error("timestamp {block} not after parent timestamp {parent}")]
    InvalidTimestamp { parent: u64, block: u64 },

    #[error("difficulty rejected by policy")]
    InvalidDifficulty,

    #[error("invalid uncle {}: {reason}", short_hex(.uncle))]
    InvalidUncle { uncle: BlockHash, reason: String },

    #[error("state transition rejected")]
    InvalidStateTransition,
}

// ---------------------------------------------------------------------------
// ChainError
// ---------------------------------------------------------------------------

/// Operational failures: the node, not the block, is at fault.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("storage failure: {0}")]
    Storage(#[from] DbError),

    #[error("not found: {}", short_hex(.0))]
    NotFound(BlockHash),

    /// A stored record does not hash to its key.
    #[error("stored block {} hashes to {}", short_hex(.key), short_hex(.computed))]
    HashMismatch { key: BlockHash, computed: BlockHash },

    #[error("database genesis {} does not match configured genesis {}", short_hex(.stored), short_hex(.configured))]
    GenesisMismatch {
        stored: BlockHash,
        configured: BlockHash,
    },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// A walk hit a hash the index does not hold.
impl From<MissingAncestor> for ChainError {
    fn from(e: MissingAncestor) -> Self {
        ChainError::NotFound(e.0)
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
