//! # Chain Module
//!
//! Turning raw blocks into a block tree with one canonical chain.
//!
//! ```text
//! engine.rs      — ChainEngine: the import pipeline and chain queries
//! validation.rs  — per-block checks, pluggable difficulty/state policies
//! fork_choice.rs — heaviest-branch rule with uncle bonus, tree routes
//! error.rs       — ImportOutcome, reject/defer reasons, ChainError
//! ```

pub mod engine;
pub mod error;
pub mod fork_choice;
pub mod validation;

pub use engine::{ChainEngine, ChainEngineBuilder, ChainStatus};
pub use error::{ChainError, ChainResult, DeferReason, ImportOutcome, RejectReason};
pub use fork_choice::{Decision, ForkChoice, MissingAncestor, TreeRoute};
pub use validation::{
    AcceptAllStates, AnyDifficulty, DifficultyPolicy, MinimumDifficulty,
    StateTransitionValidator, ValidationFailure, ValidationRules,
};
