//! # ChainDB — Persistent Block Store
//!
//! The persistence layer for the chain index, built on sled's embedded
//! key-value store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                  | Value                     |
//! |------------|----------------------|---------------------------|
//! | `blocks`   | `hash` (32B)         | raw block bytes           |
//! | `ancestry` | `hash` (32B)         | `bincode(AncestryEntry)`  |
//! | `metadata` | key (UTF-8)          | value (bytes)             |
//! | `quarantine` | `hash` (32B)       | raw bytes of stored blocks that could not be indexed |
//!
//! Hashes are written as their raw 32 bytes, the fixed-width big-endian
//! form of the 256-bit value, so sled's ordering is numeric ordering.
//!
//! ## Atomicity & Durability
//!
//! An accepted block is committed with [`ChainDB::commit_import`]: the raw
//! bytes, the ancestry entry and (when it moved) the canonical tip are
//! written in one multi-tree sled transaction and then flushed. Either the
//! whole import is on disk when the call returns or none of it is.

use sled::transaction::{TransactionError, TransactionResult};
use sled::{Db, Transactional, Tree};
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use super::index::AncestryEntry;
use crate::crypto::{short_hex, BlockHash};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Well-known key in the `metadata` tree for the canonical tip hash.
const META_CANONICAL_TIP: &[u8] = b"canonical_tip";

/// Well-known key in the `metadata` tree for the genesis hash.
const META_GENESIS_HASH: &[u8] = b"genesis_hash";

/// sled releases its file lock from a background thread after the last
/// handle drops, so an immediate reopen can find it still held.
const OPEN_ATTEMPTS: u32 = 8;

/// Delay before the first retry; doubled after each attempt.
const OPEN_BACKOFF: Duration = Duration::from_millis(5);

// ---------------------------------------------------------------------------
// ChainDB
// ---------------------------------------------------------------------------

/// Persistent storage engine for blocks and the ancestry index.
///
/// # Thread Safety
///
/// sled trees support lock-free concurrent reads and serialized writes.
/// `ChainDB` is `Clone` and can be shared across threads without external
/// synchronization.
#[derive(Debug, Clone)]
pub struct ChainDB {
    /// The underlying sled database handle.
    db: Db,
    /// Raw block bytes keyed by block hash.
    blocks: Tree,
    /// Serialized ancestry entries keyed by block hash.
    ancestry: Tree,
    /// Canonical tip, genesis hash.
    metadata: Tree,
    /// Stored blocks set aside by an index rebuild.
    quarantine: Tree,
}

impl ChainDB {
    /// Open or create a database at the given filesystem path.
    ///
    /// A file lock still held by a just-closed handle is retried with
    /// exponential backoff before the error is returned.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let path = path.as_ref();
        let mut delay = OPEN_BACKOFF;
        let mut attempt = 1;
        loop {
            match sled::open(path) {
                Ok(db) => return Self::from_db(db),
                Err(sled::Error::Io(e))
                    if e.kind() == io::ErrorKind::WouldBlock && attempt < OPEN_ATTEMPTS =>
                {
                    tracing::debug!(attempt, path = %path.display(), "database lock busy, retrying");
                    thread::sleep(delay);
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Create a temporary database that is removed when dropped.
    ///
    /// Ideal for unit tests — no filesystem side effects, no cleanup needed.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let blocks = db.open_tree("blocks")?;
        let ancestry = db.open_tree("ancestry")?;
        let metadata = db.open_tree("metadata")?;
        let quarantine = db.open_tree("quarantine")?;

        Ok(Self {
            db,
            blocks,
            ancestry,
            metadata,
            quarantine,
        })
    }

    // -- Block operations ---------------------------------------------------

    /// Store raw block bytes under their hash and flush.
    ///
    /// Idempotent: hashes are content addresses, so an overwrite writes the
    /// same bytes again.
    pub fn put_block(&self, hash: &BlockHash, raw: &[u8]) -> DbResult<()> {
        self.blocks.insert(hash, raw)?;
        self.db.flush()?;
        Ok(())
    }

    /// Retrieve raw block bytes.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] if no block is stored under `hash`.
    pub fn get_block(&self, hash: &BlockHash) -> DbResult<Vec<u8>> {
        match self.blocks.get(hash)? {
            Some(bytes) => Ok(bytes.to_vec()),
            None => Err(DbError::NotFound(format!("block {}", hex::encode(hash)))),
        }
    }

    /// Is a block stored under this hash?
    pub fn contains_block(&self, hash: &BlockHash) -> DbResult<bool> {
        Ok(self.blocks.contains_key(hash)?)
    }

    /// Iterate over every stored block as `(key, raw bytes)`.
    ///
    /// Keys that are not 32 bytes long are reported as serialization errors.
    pub fn iter_blocks(&self) -> impl Iterator<Item = DbResult<(BlockHash, Vec<u8>)>> + '_ {
        self.blocks.iter().map(|item| {
            let (key, value) = item?;
            Ok((decode_hash_key(&key)?, value.to_vec()))
        })
    }

    /// Return the number of blocks stored in the database.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Move a stored block out of `blocks` into `quarantine`, atomically.
    ///
    /// The bytes are kept for inspection but no longer count as stored.
    pub fn quarantine_block(&self, hash: &BlockHash) -> DbResult<()> {
        let result: TransactionResult<()> = (&self.blocks, &self.quarantine)
            .transaction(|(blocks, quarantine)| {
                if let Some(raw) = blocks.remove(&hash[..])? {
                    quarantine.insert(&hash[..], raw)?;
                }
                Ok(())
            });

        result.map_err(|e| match e {
            TransactionError::Abort(()) => {
                DbError::Serialization(format!("quarantine of {} aborted", short_hex(hash)))
            }
            TransactionError::Storage(e) => DbError::Sled(e),
        })
    }

    /// Number of quarantined records.
    pub fn quarantine_count(&self) -> usize {
        self.quarantine.len()
    }

    // -- Ancestry operations ------------------------------------------------

    /// Persist a single ancestry entry. Used when rebuilding the index.
    pub fn put_ancestry(&self, hash: &BlockHash, entry: &AncestryEntry) -> DbResult<()> {
        let bytes = encode_entry(entry)?;
        self.ancestry.insert(hash, bytes)?;
        Ok(())
    }

    /// Load a single ancestry entry.
    pub fn get_ancestry(&self, hash: &BlockHash) -> DbResult<Option<AncestryEntry>> {
        match self.ancestry.get(hash)? {
            Some(bytes) => Ok(Some(decode_entry(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load every persisted ancestry entry.
    pub fn load_ancestry(&self) -> DbResult<Vec<(BlockHash, AncestryEntry)>> {
        let mut entries = Vec::with_capacity(self.ancestry.len());
        for item in self.ancestry.iter() {
            let (key, value) = item?;
            entries.push((decode_hash_key(&key)?, decode_entry(&value)?));
        }
        Ok(entries)
    }

    /// Return the number of persisted ancestry entries.
    pub fn ancestry_count(&self) -> usize {
        self.ancestry.len()
    }

    // -- Import commit ------------------------------------------------------

    /// Persist an accepted block, its ancestry entry, and optionally a new
    /// canonical tip, atomically, then flush.
    ///
    /// This is the only write path the import pipeline uses.
    pub fn commit_import(
        &self,
        hash: &BlockHash,
        raw: &[u8],
        entry: &AncestryEntry,
        new_tip: Option<&BlockHash>,
    ) -> DbResult<()> {
        let entry_bytes = encode_entry(entry)?;

        let result: TransactionResult<()> = (&self.blocks, &self.ancestry, &self.metadata)
            .transaction(|(blocks, ancestry, metadata)| {
                blocks.insert(&hash[..], raw)?;
                ancestry.insert(&hash[..], entry_bytes.as_slice())?;
                if let Some(tip) = new_tip {
                    metadata.insert(META_CANONICAL_TIP, &tip[..])?;
                }
                Ok(())
            });

        result.map_err(|e| match e {
            TransactionError::Abort(()) => {
                DbError::Serialization(format!("import of {} aborted", short_hex(hash)))
            }
            TransactionError::Storage(e) => DbError::Sled(e),
        })?;

        self.db.flush()?;
        Ok(())
    }

    // -- Metadata operations ------------------------------------------------

    /// The persisted canonical tip, if one has been recorded.
    pub fn canonical_tip(&self) -> DbResult<Option<BlockHash>> {
        self.read_hash_meta(META_CANONICAL_TIP)
    }

    /// Record the canonical tip.
    pub fn set_canonical_tip(&self, hash: &BlockHash) -> DbResult<()> {
        self.metadata.insert(META_CANONICAL_TIP, &hash[..])?;
        Ok(())
    }

    /// The genesis hash this database was initialised with.
    pub fn genesis_hash(&self) -> DbResult<Option<BlockHash>> {
        self.read_hash_meta(META_GENESIS_HASH)
    }

    /// Record the genesis hash. Written once, on first open.
    pub fn set_genesis_hash(&self, hash: &BlockHash) -> DbResult<()> {
        self.metadata.insert(META_GENESIS_HASH, &hash[..])?;
        Ok(())
    }

    fn read_hash_meta(&self, key: &[u8]) -> DbResult<Option<BlockHash>> {
        match self.metadata.get(key)? {
            Some(bytes) => Ok(Some(decode_hash_key(&bytes)?)),
            None => Ok(None),
        }
    }

    // -- Utility operations -------------------------------------------------

    /// Force a flush of all pending writes to disk.
    ///
    /// sled buffers writes in memory for performance. This call blocks
    /// until all data is durable on the underlying storage device.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn decode_hash_key(bytes: &[u8]) -> DbResult<BlockHash> {
    bytes
        .try_into()
        .map_err(|_| DbError::Serialization(format!("invalid hash length {}", bytes.len())))
}

fn encode_entry(entry: &AncestryEntry) -> DbResult<Vec<u8>> {
    bincode::serialize(entry).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode_entry(bytes: &[u8]) -> DbResult<AncestryEntry> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
