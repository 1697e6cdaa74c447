//! # Chain Engine — Import Pipeline
//!
//! The one component callers drive. Raw blocks go in through
//! [`ChainEngine::import`]; every call returns a precise [`ImportOutcome`]
//! or, if the node itself is in trouble, a [`ChainError`].
//!
//! ## Pipeline
//!
//! ```text
//! raw ─► decode ─► hash identity ─► known? ─► parent known? ─► validate
//!          │             │             │            │              │
//!      Malformed    HashMismatch  AlreadyKnown  Deferred     Rejected/Deferred
//!
//!   ─► [writer lock] re-check known ─► fork choice ─► commit (sled txn)
//!                                                  ─► index insert ─► tip
//! ```
//!
//! ## Locking
//!
//! One `RwLock` guards the ancestry index and the canonical tip. Decoding
//! and hashing take no lock. Validation holds the read lock, so unrelated
//! candidates validate concurrently. The commit, index insert and tip move
//! happen under the write lock, and every query takes the read lock, so no
//! reader sees a block in the store that the index doesn't know (or the
//! reverse).
//!
//! Two imports racing on the same block both validate; the second to reach
//! the write lock sees it already indexed and reports `AlreadyKnown`.
//!
//! ## Restart
//!
//! Opening an existing database loads the persisted ancestry entries and
//! canonical tip. If blocks exist without ancestry entries, the index is
//! rebuilt by scanning the block store before any import is accepted.
//! Stored blocks the rebuild cannot attach to genesis are moved to the
//! store's quarantine tree.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use primitive_types::U256;

use super::error::{ChainError, ChainResult, ImportOutcome, RejectReason};
use super::fork_choice::{Decision, ForkChoice};
use super::validation::{
    assign_number, check_structure, resolve_parent, validate_block, DifficultyPolicy,
    StateTransitionValidator, ValidationRules,
};
use crate::config::EngineConfig;
use crate::crypto::{short_hex, BlockHash, ZERO_HASH};
use crate::storage::{
    AncestryEntry, AncestryIndex, BincodeCodec, Block, BlockCodec, BlockHeader, ChainDB, DbError,
};

// ---------------------------------------------------------------------------
// ChainStatus
// ---------------------------------------------------------------------------

/// Snapshot of the engine's headline numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStatus {
    pub genesis: BlockHash,
    pub tip: BlockHash,
    pub tip_number: u64,
    pub tip_weight: U256,
    pub known_blocks: usize,
    pub heads: usize,
}

// ---------------------------------------------------------------------------
// ChainEngineBuilder
// ---------------------------------------------------------------------------

/// Wires collaborators into a [`ChainEngine`].
///
/// Anything not set explicitly falls back to the defaults: the bincode
/// codec, a minimum-difficulty policy from the config, and a state
/// validator that accepts everything.
pub struct ChainEngineBuilder {
    config: EngineConfig,
    genesis: Block,
    codec: Arc<dyn BlockCodec>,
    difficulty: Option<Arc<dyn DifficultyPolicy>>,
    state: Option<Arc<dyn StateTransitionValidator>>,
}

impl ChainEngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            genesis: Block::genesis(),
            codec: Arc::new(BincodeCodec),
            difficulty: None,
            state: None,
        }
    }

    pub fn genesis(mut self, genesis: Block) -> Self {
        self.genesis = genesis;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn BlockCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn difficulty_policy(mut self, policy: Arc<dyn DifficultyPolicy>) -> Self {
        self.difficulty = Some(policy);
        self
    }

    pub fn state_validator(mut self, validator: Arc<dyn StateTransitionValidator>) -> Self {
        self.state = Some(validator);
        self
    }

    /// Open (or create) the engine's database at `path`.
    pub fn open<P: AsRef<Path>>(self, path: P) -> ChainResult<ChainEngine> {
        let db = ChainDB::open(path)?;
        self.build(db)
    }

    /// Open an engine over a throwaway database.
    pub fn open_temporary(self) -> ChainResult<ChainEngine> {
        let db = ChainDB::open_temporary()?;
        self.build(db)
    }

    fn build(self, db: ChainDB) -> ChainResult<ChainEngine> {
        self.config.validate()?;

        let mut rules = ValidationRules::from_config(&self.config);
        if let Some(difficulty) = self.difficulty {
            rules.difficulty = difficulty;
        }
        if let Some(state) = self.state {
            rules.state = state;
        }

        let genesis_raw = self.codec.encode(&self.genesis)?;
        let genesis_hash = self.codec.hash(&genesis_raw);
        let genesis_entry = AncestryEntry {
            number: 0,
            parent_hash: ZERO_HASH,
            difficulty: self.genesis.header.difficulty,
            uncles: Vec::new(),
        };

        match db.genesis_hash()? {
            Some(stored) if stored != genesis_hash => {
                return Err(ChainError::GenesisMismatch {
                    stored,
                    configured: genesis_hash,
                });
            }
            Some(_) => {}
            None => {
                db.commit_import(&genesis_hash, &genesis_raw, &genesis_entry, None)?;
                db.set_genesis_hash(&genesis_hash)?;
                db.flush()?;
                tracing::info!(genesis = %short_hex(&genesis_hash), "initialised chain database");
            }
        }

        let fork_choice = ForkChoice::new(self.config.uncle_bonus);
        let index = load_index(&db, self.codec.as_ref(), &genesis_hash)?;

        let tip = match db.canonical_tip()? {
            Some(tip) if index.contains(&tip) => tip,
            stored => {
                let tip = fork_choice.heaviest_head(&index, &genesis_hash);
                if stored.is_some() {
                    tracing::warn!(
                        tip = %short_hex(&tip),
                        "persisted tip not in index, recomputed from heaviest head"
                    );
                }
                db.set_canonical_tip(&tip)?;
                db.flush()?;
                tip
            }
        };

        tracing::info!(
            known_blocks = index.len(),
            tip = %short_hex(&tip),
            tip_number = index.lookup(&tip).map(|e| e.number).unwrap_or(0),
            "chain engine ready"
        );

        Ok(ChainEngine {
            db,
            codec: self.codec,
            rules,
            fork_choice,
            genesis_hash,
            state: RwLock::new(ChainState { index, tip }),
        })
    }
}

/// Load persisted ancestry entries, rebuilding from the block store if any
/// stored block is missing its entry.
fn load_index(
    db: &ChainDB,
    codec: &dyn BlockCodec,
    genesis_hash: &BlockHash,
) -> ChainResult<AncestryIndex> {
    let mut index = AncestryIndex::from_entries(db.load_ancestry()?);
    if index.len() >= db.block_count() && index.contains(genesis_hash) {
        return Ok(index);
    }

    tracing::warn!(
        indexed = index.len(),
        stored = db.block_count(),
        "ancestry index incomplete, rebuilding from block store"
    );

    // Decode every unindexed block and group it under its parent.
    let mut undecodable = Vec::new();
    let mut orphans: HashMap<BlockHash, Vec<(BlockHash, BlockHeader)>> = HashMap::new();
    for item in db.iter_blocks() {
        let (key, raw) = item?;
        let computed = codec.hash(&raw);
        if computed != key {
            return Err(ChainError::HashMismatch { key, computed });
        }
        if index.contains(&key) {
            continue;
        }
        if key == *genesis_hash {
            let entry = AncestryEntry {
                number: 0,
                parent_hash: ZERO_HASH,
                difficulty: codec.decode(&raw)?.header.difficulty,
                uncles: Vec::new(),
            };
            db.put_ancestry(&key, &entry)?;
            // Cannot collide: `contains` was checked just above.
            let _ = index.insert(key, entry);
            continue;
        }
        match codec.decode(&raw) {
            Ok(block) => orphans
                .entry(block.header.parent_hash)
                .or_default()
                .push((key, block.header)),
            Err(e) => {
                tracing::warn!(hash = %short_hex(&key), error = %e, "undecodable stored block");
                undecodable.push(key);
            }
        }
    }

    // Attach orphans breadth-first beneath every indexed block.
    let mut queue: VecDeque<BlockHash> = index.iter().map(|(hash, _)| *hash).collect();
    let mut rebuilt = 0usize;
    while let Some(parent) = queue.pop_front() {
        let Some(children) = orphans.remove(&parent) else {
            continue;
        };
        let parent_number = match index.lookup(&parent) {
            Some(entry) => entry.number,
            None => continue,
        };
        for (hash, header) in children {
            let entry = AncestryEntry {
                number: parent_number + 1,
                parent_hash: parent,
                difficulty: header.difficulty,
                uncles: header.uncles,
            };
            db.put_ancestry(&hash, &entry)?;
            if index.insert(hash, entry).is_ok() {
                rebuilt += 1;
                queue.push_back(hash);
            }
        }
    }

    // Whatever is left can never be indexed from this store. Set it aside so
    // the next open takes the fast path.
    let unreachable: Vec<BlockHash> = orphans
        .into_values()
        .flatten()
        .map(|(hash, _)| hash)
        .collect();
    for hash in unreachable.iter().chain(&undecodable) {
        db.quarantine_block(hash)?;
    }
    db.flush()?;

    if !unreachable.is_empty() || !undecodable.is_empty() {
        tracing::warn!(
            unreachable = unreachable.len(),
            undecodable = undecodable.len(),
            "stored blocks quarantined, not indexed"
        );
    }
    tracing::info!(rebuilt, known_blocks = index.len(), "ancestry index rebuilt");

    Ok(index)
}

// ---------------------------------------------------------------------------
// ChainEngine
// ---------------------------------------------------------------------------

struct ChainState {
    index: AncestryIndex,
    tip: BlockHash,
}

/// Block import, ancestry index, and canonical tip for one database.
///
/// Each engine owns its own state; independent engines (one per test, say)
/// never interfere. Share one engine across threads with `Arc`.
pub struct ChainEngine {
    db: ChainDB,
    codec: Arc<dyn BlockCodec>,
    rules: ValidationRules,
    fork_choice: ForkChoice,
    genesis_hash: BlockHash,
    state: RwLock<ChainState>,
}

impl std::fmt::Debug for ChainEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainEngine")
            .field("genesis", &short_hex(&self.genesis_hash))
            .field("tip", &short_hex(&self.state.read().tip))
            .finish_non_exhaustive()
    }
}

impl ChainEngine {
    /// Open (or create) a chain database with default collaborators.
    pub fn open<P: AsRef<Path>>(path: P, config: EngineConfig) -> ChainResult<Self> {
        ChainEngineBuilder::new(config).open(path)
    }

    /// Temporary database, default collaborators. For tests and tooling.
    pub fn open_temporary(config: EngineConfig) -> ChainResult<Self> {
        ChainEngineBuilder::new(config).open_temporary()
    }

    /// Flush everything and release the database.
    pub fn close(self) -> ChainResult<()> {
        self.db.flush()?;
        tracing::debug!("chain engine closed");
        Ok(())
    }

    // -- Import -------------------------------------------------------------

    /// Import one raw block.
    ///
    /// # Errors
    ///
    /// Only operational failures (storage, a corrupted index) are errors.
    /// Invalid and premature blocks are reported through the outcome.
    pub fn import(&self, raw: &[u8]) -> ChainResult<ImportOutcome> {
        self.import_inner(raw, None)
    }

    /// Import a block whose hash was announced separately (for example by
    /// the peer that sent it). The announced hash must match the bytes.
    pub fn import_announced(&self, announced: &BlockHash, raw: &[u8]) -> ChainResult<ImportOutcome> {
        self.import_inner(raw, Some(announced))
    }

    fn import_inner(&self, raw: &[u8], announced: Option<&BlockHash>) -> ChainResult<ImportOutcome> {
        let outcome = self.try_import(raw, announced)?;
        match &outcome {
            ImportOutcome::Accepted { hash, number, canonical } => {
                tracing::debug!(hash = %short_hex(hash), number, canonical, "block accepted");
            }
            ImportOutcome::AlreadyKnown(hash) => {
                tracing::debug!(hash = %short_hex(hash), "block already known");
            }
            ImportOutcome::Deferred(reason) => {
                tracing::debug!(%reason, "block deferred");
            }
            ImportOutcome::Rejected(reason) => {
                tracing::warn!(%reason, "block rejected");
            }
        }
        Ok(outcome)
    }

    fn try_import(&self, raw: &[u8], announced: Option<&BlockHash>) -> ChainResult<ImportOutcome> {
        // 1. Decode.
        let mut block = match self.codec.decode(raw) {
            Ok(block) => block,
            Err(e) => return Ok(ImportOutcome::Rejected(RejectReason::MalformedBlock(e.to_string()))),
        };

        // 2. Hash identity: the canonical re-encoding must hash the same,
        //    and so must any announced hash.
        let hash = self.codec.hash(raw);
        let recomputed = self.codec.hash(&self.codec.encode(&block)?);
        if recomputed != hash {
            return Ok(ImportOutcome::Rejected(RejectReason::HashMismatch {
                expected: hash,
                computed: recomputed,
            }));
        }
        if let Some(announced) = announced {
            if *announced != hash {
                return Ok(ImportOutcome::Rejected(RejectReason::HashMismatch {
                    expected: *announced,
                    computed: hash,
                }));
            }
        }

        if let Err(reason) = check_structure(&block) {
            return Ok(ImportOutcome::Rejected(reason));
        }

        // 3. Ancestry-relative validation under the read lock.
        let entry = {
            let state = self.state.read();
            if state.index.contains(&hash) {
                return Ok(ImportOutcome::AlreadyKnown(hash));
            }

            let parent_entry = match resolve_parent(&block.header, &state.index) {
                Ok(entry) => entry.clone(),
                Err(reason) => return Ok(ImportOutcome::Deferred(reason)),
            };
            let parent_header = self.load_header(&block.header.parent_hash, parent_entry.number)?;
            let number = assign_number(&mut block.header, &parent_entry);

            if let Err(failure) = validate_block(&block, &parent_header, &state.index, &self.rules) {
                return Ok(failure.into());
            }

            AncestryEntry {
                number,
                parent_hash: block.header.parent_hash,
                difficulty: block.header.difficulty,
                uncles: block.header.uncles.clone(),
            }
        };

        // 4. Commit under the write lock.
        let mut state = self.state.write();
        if state.index.contains(&hash) {
            return Ok(ImportOutcome::AlreadyKnown(hash));
        }

        let decision = self.fork_choice.resolve(&state.index, &state.tip, &hash, &entry)?;
        let new_tip = matches!(decision, Decision::Switch(_)).then_some(&hash);

        self.db.commit_import(&hash, raw, &entry, new_tip)?;

        let number = entry.number;
        if state.index.insert(hash, entry).is_err() {
            return Ok(ImportOutcome::AlreadyKnown(hash));
        }

        let canonical = match decision {
            Decision::Keep => false,
            Decision::Switch(route) => {
                if route.is_reorg() {
                    tracing::info!(
                        old_tip = %short_hex(&state.tip),
                        new_tip = %short_hex(&hash),
                        common_ancestor = %short_hex(&route.common_ancestor),
                        retracted = route.retracted.len(),
                        enacted = route.enacted.len(),
                        "chain reorganisation"
                    );
                } else {
                    tracing::info!(tip = %short_hex(&hash), number, "canonical tip advanced");
                }
                state.tip = hash;
                true
            }
        };

        Ok(ImportOutcome::Accepted {
            hash,
            number,
            canonical,
        })
    }

    /// Decode a stored block's header and fill in its number.
    fn load_header(&self, hash: &BlockHash, number: u64) -> ChainResult<BlockHeader> {
        let raw = self.db.get_block(hash)?;
        let mut header = self.codec.decode(&raw)?.header;
        header.number = Some(number);
        Ok(header)
    }

    // -- Queries ------------------------------------------------------------

    /// Raw bytes of a known block.
    pub fn block(&self, hash: &BlockHash) -> ChainResult<Vec<u8>> {
        let state = self.state.read();
        if !state.index.contains(hash) {
            return Err(ChainError::NotFound(*hash));
        }
        self.db.get_block(hash).map_err(|e| match e {
            DbError::NotFound(_) => ChainError::NotFound(*hash),
            other => ChainError::Storage(other),
        })
    }

    /// Decoded header of a known block, number filled in.
    pub fn header(&self, hash: &BlockHash) -> ChainResult<BlockHeader> {
        let state = self.state.read();
        let entry = state.index.lookup(hash).ok_or(ChainError::NotFound(*hash))?;
        self.load_header(hash, entry.number)
    }

    /// Head of the canonical chain.
    pub fn canonical_tip_hash(&self) -> BlockHash {
        self.state.read().tip
    }

    /// Number of a known block.
    pub fn block_number(&self, hash: &BlockHash) -> ChainResult<u64> {
        self.state
            .read()
            .index
            .lookup(hash)
            .map(|entry| entry.number)
            .ok_or(ChainError::NotFound(*hash))
    }

    /// Number of the canonical tip.
    pub fn last_block_number(&self) -> u64 {
        let state = self.state.read();
        state.index.lookup(&state.tip).map_or(0, |entry| entry.number)
    }

    /// Hashes from `from` (default: the canonical tip) back to genesis,
    /// newest first.
    pub fn canonical_chain(&self, from: Option<BlockHash>) -> ChainResult<Vec<BlockHash>> {
        self.chain_until(from, &[])
    }

    /// Like [`canonical_chain`](Self::canonical_chain), but stops after the
    /// first hash found in `early_ends`.
    ///
    /// Walks are restartable: pass the last hash of one page as `from` of
    /// the next, or pass a known ancestor as an early end to fetch only
    /// what is new since then.
    pub fn chain_until(
        &self,
        from: Option<BlockHash>,
        early_ends: &[BlockHash],
    ) -> ChainResult<Vec<BlockHash>> {
        let state = self.state.read();
        let start = from.unwrap_or(state.tip);
        let ends: HashSet<&BlockHash> = early_ends.iter().collect();

        let mut cursor = start;
        let mut entry = state.index.lookup(&cursor).ok_or(ChainError::NotFound(cursor))?;
        let mut chain = Vec::with_capacity(entry.number as usize + 1);

        loop {
            chain.push(cursor);
            if entry.number == 0 || ends.contains(&cursor) {
                return Ok(chain);
            }
            cursor = entry.parent_hash;
            entry = state.index.lookup(&cursor).ok_or(ChainError::NotFound(cursor))?;
        }
    }

    /// Known children of a block, sorted by hash.
    pub fn children_of(&self, hash: &BlockHash) -> Vec<BlockHash> {
        let mut children: Vec<BlockHash> = self.state.read().index.children_of(hash).into_iter().collect();
        children.sort();
        children
    }

    /// Is the block in the index?
    pub fn is_known(&self, hash: &BlockHash) -> bool {
        self.state.read().index.contains(hash)
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.genesis_hash
    }

    /// Cumulative fork-choice weight from genesis to `hash`.
    pub fn total_weight(&self, hash: &BlockHash) -> ChainResult<U256> {
        Ok(self.fork_choice.total_weight(&self.state.read().index, hash)?)
    }

    /// Number of indexed blocks, genesis included.
    pub fn known_blocks(&self) -> usize {
        self.state.read().index.len()
    }

    /// Headline numbers in one consistent snapshot.
    pub fn status(&self) -> ChainResult<ChainStatus> {
        let state = self.state.read();
        let tip_entry = state.index.lookup(&state.tip).ok_or(ChainError::NotFound(state.tip))?;
        Ok(ChainStatus {
            genesis: self.genesis_hash,
            tip: state.tip,
            tip_number: tip_entry.number,
            tip_weight: self.fork_choice.total_weight(&state.index, &state.tip)?,
            known_blocks: state.index.len(),
            heads: state.index.heads().len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::error::DeferReason;
    use crate::chain::validation::AnyDifficulty;
    use crate::storage::BlockBuilder;

    fn engine() -> ChainEngine {
        ChainEngine::open_temporary(EngineConfig::default()).expect("temp engine")
    }

    fn raw(block: &Block) -> Vec<u8> {
        block.to_bytes().unwrap()
    }

    fn child(parent: &Block, tag: &[u8]) -> Block {
        BlockBuilder::on(parent).unwrap().extra_data(tag).build()
    }

    #[test]
    fn fresh_engine_starts_at_genesis() {
        let engine = engine();
        let genesis = Block::genesis().hash().unwrap();

        assert_eq!(engine.genesis_hash(), genesis);
        assert_eq!(engine.canonical_tip_hash(), genesis);
        assert_eq!(engine.last_block_number(), 0);
        assert_eq!(engine.block_number(&genesis).unwrap(), 0);
        assert_eq!(engine.canonical_chain(None).unwrap(), vec![genesis]);
        assert_eq!(engine.known_blocks(), 1);
    }

    #[test]
    fn genesis_bytes_are_served() {
        let engine = engine();
        let genesis = Block::genesis();
        assert_eq!(engine.block(&genesis.hash().unwrap()).unwrap(), raw(&genesis));
    }

    #[test]
    fn accepted_block_extends_tip() {
        let engine = engine();
        let b1 = child(&Block::genesis(), b"b1");
        let hash = b1.hash().unwrap();

        let outcome = engine.import(&raw(&b1)).unwrap();
        assert_eq!(
            outcome,
            ImportOutcome::Accepted {
                hash,
                number: 1,
                canonical: true
            }
        );
        assert_eq!(engine.canonical_tip_hash(), hash);
        assert_eq!(engine.header(&hash).unwrap().number, Some(1));
    }

    #[test]
    fn malformed_bytes_rejected() {
        let engine = engine();
        let outcome = engine.import(b"garbage").unwrap();
        assert!(matches!(
            outcome,
            ImportOutcome::Rejected(RejectReason::MalformedBlock(_))
        ));
        assert_eq!(engine.known_blocks(), 1);
    }

    #[test]
    fn incoherent_block_rejected_as_malformed() {
        let engine = engine();
        let mut b1 = child(&Block::genesis(), b"b1");
        b1.header.tx_root = [0xEE; 32];

        assert!(matches!(
            engine.import(&raw(&b1)).unwrap(),
            ImportOutcome::Rejected(RejectReason::MalformedBlock(_))
        ));
    }

    #[test]
    fn announced_hash_must_match() {
        let engine = engine();
        let b1 = child(&Block::genesis(), b"b1");
        let bytes = raw(&b1);

        let outcome = engine.import_announced(&[0x42; 32], &bytes).unwrap();
        assert_eq!(
            outcome,
            ImportOutcome::Rejected(RejectReason::HashMismatch {
                expected: [0x42; 32],
                computed: b1.hash().unwrap(),
            })
        );
        assert!(!engine.is_known(&b1.hash().unwrap()));

        let outcome = engine.import_announced(&b1.hash().unwrap(), &bytes).unwrap();
        assert!(outcome.is_accepted());
    }

    #[test]
    fn unknown_parent_defers_without_persisting() {
        let engine = engine();
        let orphan = BlockBuilder::child_of([0x99; 32], 5).build();

        assert_eq!(
            engine.import(&raw(&orphan)).unwrap(),
            ImportOutcome::Deferred(DeferReason::UnknownParent([0x99; 32]))
        );
        let hash = orphan.hash().unwrap();
        assert!(matches!(engine.block(&hash), Err(ChainError::NotFound(_))));
        assert!(matches!(engine.block_number(&hash), Err(ChainError::NotFound(_))));
    }

    #[test]
    fn custom_difficulty_policy_is_used() {
        struct NeverValid;
        impl DifficultyPolicy for NeverValid {
            fn is_valid(&self, _c: &BlockHeader, _p: &BlockHeader) -> bool {
                false
            }
        }

        let engine = ChainEngineBuilder::new(EngineConfig::default())
            .difficulty_policy(Arc::new(NeverValid))
            .open_temporary()
            .unwrap();
        let b1 = child(&Block::genesis(), b"b1");
        assert_eq!(
            engine.import(&raw(&b1)).unwrap(),
            ImportOutcome::Rejected(RejectReason::InvalidDifficulty)
        );
    }

    #[test]
    fn default_policy_rejects_zero_difficulty() {
        let engine = engine();
        let b1 = BlockBuilder::on(&Block::genesis()).unwrap().difficulty(0u64).build();
        assert_eq!(
            engine.import(&raw(&b1)).unwrap(),
            ImportOutcome::Rejected(RejectReason::InvalidDifficulty)
        );

        let lenient = ChainEngineBuilder::new(EngineConfig::default())
            .difficulty_policy(Arc::new(AnyDifficulty))
            .open_temporary()
            .unwrap();
        let outcome = lenient.import(&raw(&b1)).unwrap();
        // Accepted, but a zero-weight extension does not move the tip.
        assert_eq!(
            outcome,
            ImportOutcome::Accepted {
                hash: b1.hash().unwrap(),
                number: 1,
                canonical: false
            }
        );
    }

    #[test]
    fn children_are_tracked() {
        let engine = engine();
        let genesis = Block::genesis();
        let a = child(&genesis, b"a");
        let b = child(&genesis, b"b");
        engine.import(&raw(&a)).unwrap();
        engine.import(&raw(&b)).unwrap();

        let mut expected = vec![a.hash().unwrap(), b.hash().unwrap()];
        expected.sort();
        assert_eq!(engine.children_of(&genesis.hash().unwrap()), expected);
    }

    #[test]
    fn chain_until_stops_at_early_end() {
        let engine = engine();
        let genesis = Block::genesis();
        let b1 = child(&genesis, b"1");
        let b2 = child(&b1, b"2");
        let b3 = child(&b2, b"3");
        for b in [&b1, &b2, &b3] {
            assert!(engine.import(&raw(b)).unwrap().is_accepted());
        }

        let h1 = b1.hash().unwrap();
        let h2 = b2.hash().unwrap();
        let h3 = b3.hash().unwrap();
        assert_eq!(engine.chain_until(None, &[h2]).unwrap(), vec![h3, h2]);
        assert_eq!(
            engine.canonical_chain(Some(h2)).unwrap(),
            vec![h2, h1, genesis.hash().unwrap()]
        );
        assert!(matches!(
            engine.canonical_chain(Some([0x55; 32])),
            Err(ChainError::NotFound(_))
        ));
    }

    #[test]
    fn status_reports_tip_and_heads() {
        let engine = engine();
        let genesis = Block::genesis();
        let a = BlockBuilder::on(&genesis).unwrap().difficulty(10u64).extra_data(b"a").build();
        let b = BlockBuilder::on(&genesis).unwrap().difficulty(20u64).extra_data(b"b").build();
        engine.import(&raw(&a)).unwrap();
        engine.import(&raw(&b)).unwrap();

        let status = engine.status().unwrap();
        assert_eq!(status.tip, b.hash().unwrap());
        assert_eq!(status.tip_number, 1);
        assert_eq!(status.known_blocks, 3);
        assert_eq!(status.heads, 2);
        assert_eq!(status.tip_weight, genesis.header.difficulty + U256::from(20u64));
    }

    #[test]
    fn close_flushes() {
        let engine = engine();
        engine.import(&raw(&child(&Block::genesis(), b"x"))).unwrap();
        engine.close().expect("close should succeed");
    }
}
