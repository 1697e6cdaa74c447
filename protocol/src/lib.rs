// Copyright (c) 2026 Strata Contributors. MIT License.
// See LICENSE for details.

//! # Strata Protocol — Chain Index Core
//!
//! This crate is the part of a Strata node that decides what the chain
//! *is*. Raw blocks come in from wherever (the network, a disk replay, a
//! test harness), and this crate answers three questions about each one:
//! is it coherent, where does it hang in the block tree, and does it move
//! the canonical tip?
//!
//! ## Architecture
//!
//! ```text
//! raw bytes ─► BlockCodec ─► validation ─► AncestryIndex ─► ForkChoice
//!                                 │              │              │
//!                                 └────────► ChainDB ◄──────────┘
//!                                          (sled, durable)
//! ```
//!
//! - **crypto** — BLAKE3 hashing and the `BlockHash` identifier.
//! - **storage** — block model, wire codec, sled persistence, ancestry index.
//! - **chain** — the import pipeline, block validation, and fork choice.
//! - **config** — protocol constants and the engine configuration.
//!
//! ## Ground Rules
//!
//! 1. Every import gets a precise answer. Nothing is swallowed.
//! 2. Storage failures are operational errors, never "invalid block".
//! 3. The tip only moves when a strictly heavier branch shows up.

pub mod chain;
pub mod config;
pub mod crypto;
pub mod storage;

pub use chain::{ChainEngine, ChainEngineBuilder, ChainError, ImportOutcome};
pub use config::EngineConfig;
pub use crypto::BlockHash;
pub use storage::{Block, BlockHeader};
