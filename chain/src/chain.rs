//! Chain façade: the single entry point a node uses to bootstrap from
//! genesis and to accept new blocks, tying together the repository, the
//! state database, the validators cache, and block validation.

use std::sync::Arc;

use crate::block_applier::apply_block;
use crate::config::EconomicsConfig;
use crate::error::{ChainError, ChainResult};
use crate::metrics::ChainMetrics;
use crate::repository::Repository;
use crate::sortition::Vrf;
use crate::state::StateDB;
use crate::types::{Block, BlockHash};
use crate::validator::{parent_seed_of, validate_proposed_block, validate_proposer_proof};
use crate::validators::ValidatorsCache;

/// Ties storage, state, and the validator set together behind a single
/// `add_block` entry point.
pub struct Chain<R, D, V> {
    repository: R,
    state_db: D,
    vrf: V,
    economics: EconomicsConfig,
    validators: ValidatorsCache,
    head_hash: BlockHash,
    head_height: u64,
    metrics: Option<Arc<ChainMetrics>>,
}

impl<R: Repository, D: StateDB, V: Vrf> Chain<R, D, V> {
    /// Bootstraps a fresh chain from `genesis`, persisting it at its own
    /// declared height and building the initial validators cache from
    /// whatever state `state_db` starts with (typically seeded by the
    /// caller before this is called). Genesis height is the caller's
    /// convention, not an engine invariant.
    pub fn genesis(
        repository: R,
        state_db: D,
        vrf: V,
        economics: EconomicsConfig,
        genesis: Block,
    ) -> ChainResult<Self> {
        let height = genesis.height();
        let hash = genesis.hash();
        repository.write_block(&genesis)?;
        repository.write_canonical_hash(height, hash)?;
        repository.write_head(hash)?;

        let mut validators = ValidatorsCache::new();
        let snapshot = state_db.new_for_check();
        validators.refresh_if_updated(&snapshot, &[]);

        Ok(Self {
            repository,
            state_db,
            vrf,
            economics,
            validators,
            head_hash: hash,
            head_height: height,
            metrics: None,
        })
    }

    /// Attaches a metrics handle, recorded against from this point on.
    pub fn with_metrics(mut self, metrics: Arc<ChainMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn head_hash(&self) -> BlockHash {
        self.head_hash
    }

    pub fn head_height(&self) -> u64 {
        self.head_height
    }

    pub fn head_block(&self) -> ChainResult<Block> {
        self.repository
            .read_block(&self.head_hash)?
            .ok_or(ChainError::NoHead)
    }

    pub fn economics(&self) -> &EconomicsConfig {
        &self.economics
    }

    /// Number of addresses currently in the validator committee.
    pub fn committee_size(&self, final_committee: bool) -> usize {
        self.validators.committee_size(final_committee, &self.economics)
    }

    /// Minimum number of committee votes needed for Byzantine-fault
    /// tolerant agreement.
    pub fn committee_votes_threshold(&self, final_committee: bool) -> usize {
        self.validators.committee_votes_threshold(final_committee, &self.economics)
    }

    /// Verifies a standalone eligibility proof against the current
    /// validator cache and economics configuration, without requiring a
    /// full candidate block.
    pub fn validate_proposer_proof(
        &self,
        block: &Block,
        parent_seed: &crate::types::Hash256,
        proof: &[u8],
    ) -> ChainResult<()> {
        validate_proposer_proof(
            &self.vrf,
            &self.validators,
            &self.economics,
            block,
            parent_seed,
            proof,
            self.metrics.as_deref(),
        )
    }

    /// Validates `block` against the current head, applies it, and
    /// persists the result as the new head. Returns the resulting
    /// state root on success; on failure, state is left untouched.
    pub fn add_block(&mut self, block: Block) -> ChainResult<crate::types::Hash256> {
        let parent = self.head_block()?;

        let root = match validate_proposed_block(
            &self.vrf,
            &self.validators,
            &self.state_db,
            &self.economics,
            &parent,
            &block,
            self.metrics.as_deref(),
        ) {
            Ok(root) => root,
            Err(e) => {
                if let Some(m) = &self.metrics {
                    m.blocks_rejected_total.inc();
                }
                return Err(e);
            }
        };

        let mut snapshot = self.state_db.new_for_check();
        if let Err(e) = apply_block(&mut snapshot, &block, &self.validators, &self.economics, self.metrics.as_deref()) {
            if let Some(m) = &self.metrics {
                m.blocks_rejected_total.inc();
            }
            return Err(e);
        }
        self.state_db.commit(snapshot)?;

        let hash = block.hash();
        self.repository.write_block(&block)?;
        self.repository
            .write_canonical_hash(block.height(), hash)?;
        self.repository.write_head(hash)?;

        self.head_hash = hash;
        self.head_height = block.height();

        let refreshed = self.state_db.new_for_check();
        self.validators
            .refresh_if_updated(&refreshed, block.transactions());

        Ok(root)
    }

    /// Seed to feed the next height's sortition: the current head's
    /// carried VRF output (or zero, right after an `Empty` head).
    pub fn next_seed(&self) -> ChainResult<crate::types::Hash256> {
        let head = self.head_block()?;
        Ok(parent_seed_of(&head))
    }

    /// Convenience wrapper used by a node's block producer loop:
    /// attempts to propose a block for the next height and, if this
    /// node wins sortition, immediately validates and commits it.
    /// Returns `Ok(None)` when this node did not win sortition.
    pub fn propose_and_add(
        &mut self,
        own_secret_key: &[u8],
        own_public_key: &[u8],
        time: u64,
        tx_pool: &mut dyn crate::proposer::TxPool,
    ) -> ChainResult<Option<Block>> {
        let input = crate::proposer::ProposalInput {
            parent_hash: self.head_hash,
            parent_height: self.head_height,
            parent_seed: self.next_seed()?,
            own_secret_key,
            own_public_key,
            time,
        };
        let maybe_block = crate::proposer::propose(
            &self.vrf,
            &self.validators,
            &self.state_db,
            &self.economics,
            tx_pool,
            &input,
            self.metrics.as_deref(),
        )?;
        if let Some(block) = &maybe_block {
            self.add_block(block.clone())?;
        }
        Ok(maybe_block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use crate::sortition::{SortitionError, VrfOutput};
    use crate::state::InMemoryStateDB;
    use crate::types::{Header, Hash256};

    struct StubVrf;
    impl Vrf for StubVrf {
        fn prove(&self, _sk: &[u8], _seed: &[u8]) -> Result<VrfOutput, SortitionError> {
            Ok(VrfOutput {
                hash: Hash256::zero(),
                proof: vec![],
            })
        }
        fn verify(&self, _pk: &[u8], _seed: &[u8], _proof: &[u8]) -> Result<Hash256, SortitionError> {
            Ok(Hash256::zero())
        }
    }

    fn genesis_block() -> Block {
        Block {
            header: Header::Empty {
                parent_hash: BlockHash(Hash256::zero()),
                height: 1,
                state_root: Hash256::zero(),
            },
            body: None,
        }
    }

    #[test]
    fn genesis_sets_head_at_its_declared_height() {
        let chain = Chain::genesis(
            InMemoryRepository::new(),
            InMemoryStateDB::new(),
            StubVrf,
            EconomicsConfig::default(),
            genesis_block(),
        )
        .expect("genesis");
        assert_eq!(chain.head_height(), 1);
        assert_eq!(chain.committee_size(false), 0);
    }

    #[test]
    fn add_block_advances_head() {
        let mut chain = Chain::genesis(
            InMemoryRepository::new(),
            InMemoryStateDB::new(),
            StubVrf,
            EconomicsConfig::default(),
            genesis_block(),
        )
        .expect("genesis");

        let parent_hash = chain.head_hash();
        let next = Block {
            header: Header::Empty {
                parent_hash,
                height: 2,
                state_root: Hash256::zero(),
            },
            body: None,
        };
        chain.add_block(next).expect("add block");
        assert_eq!(chain.head_height(), 2);
    }

    #[test]
    fn committee_votes_threshold_is_zero_with_no_validators() {
        let chain = Chain::genesis(
            InMemoryRepository::new(),
            InMemoryStateDB::new(),
            StubVrf,
            EconomicsConfig::default(),
            genesis_block(),
        )
        .expect("genesis");
        assert_eq!(chain.committee_votes_threshold(false), 0);
    }

    #[test]
    fn add_block_records_a_rejection_when_the_block_fails_validation() {
        use crate::metrics::ChainMetrics;
        use prometheus::Registry;

        let registry = Registry::new();
        let metrics = Arc::new(ChainMetrics::register(&registry).expect("register metrics"));

        let mut chain = Chain::genesis(
            InMemoryRepository::new(),
            InMemoryStateDB::new(),
            StubVrf,
            EconomicsConfig::default(),
            genesis_block(),
        )
        .expect("genesis")
        .with_metrics(metrics.clone());

        let bad_parent = Block {
            header: Header::Empty {
                parent_hash: BlockHash(Hash256::compute(b"not-the-real-parent")),
                height: 2,
                state_root: Hash256::zero(),
            },
            body: None,
        };
        assert!(chain.add_block(bad_parent).is_err());
        assert_eq!(metrics.blocks_rejected_total.get(), 1);
    }
}
