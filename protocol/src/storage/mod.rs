//! # Storage Module
//!
//! Everything the chain index keeps, in memory and on disk.
//!
//! ## Architecture
//!
//! ```text
//! block.rs  — Block structure, genesis block, builder, Merkle root
//! codec.rs  — BlockCodec trait and the default bincode/BLAKE3 codec
//! index.rs  — AncestryIndex: hash → (number, parent), parent → children
//! db.rs     — sled persistence: raw blocks, ancestry entries, metadata
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! raw bytes → BlockCodec → Block
//!     ↓                      ↓
//!  ChainDB (blocks)    AncestryEntry → AncestryIndex
//!                            ↓
//!                     ChainDB (ancestry)
//! ```
//!
//! The raw bytes are what gets stored, never a re-encoding: a block's hash
//! is the hash of exactly what was received.

pub mod block;
pub mod codec;
pub mod db;
pub mod index;

pub use block::{compute_merkle_root, Block, BlockBuilder, BlockHeader};
pub use codec::{BincodeCodec, BlockCodec, CodecError};
pub use db::{ChainDB, DbError, DbResult};
pub use index::{AncestryEntry, AncestryIndex, IndexError};
