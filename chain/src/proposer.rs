//! Block proposal: turns a sortition win into a concrete candidate
//! block.

use std::time::Instant;

use thiserror::Error;

use crate::block_applier::apply_block;
use crate::config::EconomicsConfig;
use crate::error::ChainResult;
use crate::executor::apply_tx_on_state;
use crate::metrics::ChainMetrics;
use crate::sortition::{block_seed_input, eligibility_seed_input, is_eligible, Vrf};
use crate::state::StateDB;
use crate::types::{Address, Block, BlockHash, Body, Header, PublicKey, Transaction};
use crate::validators::ValidatorsCache;

/// Maximum number of transactions a proposer will pack into one block.
pub const MAX_TXS_PER_BLOCK: usize = 2_000;

/// Source of candidate transactions for a new block.
pub trait TxPool: Send + Sync {
    /// Returns up to `max_txs` transactions to attempt to include,
    /// highest-tip first.
    fn build_candidate_batch(&self, max_txs: usize) -> Vec<Transaction>;

    /// Called after a block is proposed with every transaction that was
    /// considered for it (whether it made it in or was filtered out as
    /// invalid), so the pool can drop all of them and keep only the
    /// untouched remainder.
    fn reset_to(&mut self, applied: &[Transaction]);
}

#[derive(Debug, Error)]
pub enum ProposerError {
    #[error("VRF evaluation failed: {0}")]
    Sortition(#[from] crate::sortition::SortitionError),
}

/// Everything [`propose`] needs that is not already carried by the
/// validators cache or state database.
pub struct ProposalInput<'a> {
    pub parent_hash: BlockHash,
    pub parent_height: u64,
    pub parent_seed: crate::types::Hash256,
    pub own_secret_key: &'a [u8],
    pub own_public_key: &'a [u8],
    pub time: u64,
}

/// Attempts to produce a block for the height following `input.parent_height`.
///
/// Returns `Ok(None)` if this node's eligibility VRF output does not
/// clear `economics.proposer_threshold` for that height, or if the
/// validator cache is non-empty and this node is not a member of it —
/// the caller should not propose, and waits for another validator (or
/// an `Empty` header fallback) instead.
pub fn propose(
    vrf: &dyn Vrf,
    validators: &ValidatorsCache,
    state_db: &dyn StateDB,
    economics: &EconomicsConfig,
    tx_pool: &mut dyn TxPool,
    input: &ProposalInput,
    metrics: Option<&ChainMetrics>,
) -> ChainResult<Option<Block>> {
    let height = input.parent_height + 1;
    let own_addr = PublicKey(input.own_public_key.to_vec()).to_address();

    let eligibility_input = eligibility_seed_input(&input.parent_seed, height);
    let eligibility_started = Instant::now();
    let eligibility_output = vrf
        .prove(input.own_secret_key, &eligibility_input)
        .map_err(ProposerError::from)
        .map_err(|e| crate::error::ChainError::Repository(e.to_string()))?;
    if let Some(m) = metrics {
        m.sortition_eval_seconds.observe(eligibility_started.elapsed().as_secs_f64());
    }

    if !is_eligible(&eligibility_output.hash, economics.proposer_threshold) {
        return Ok(None);
    }
    if !validators.is_empty() && !validators.contains(&own_addr) {
        return Ok(None);
    }

    let block_seed_in = block_seed_input(&input.parent_seed, height, input.parent_hash);
    let block_seed_started = Instant::now();
    let seed_output = vrf
        .prove(input.own_secret_key, &block_seed_in)
        .map_err(ProposerError::from)
        .map_err(|e| crate::error::ChainError::Repository(e.to_string()))?;
    if let Some(m) = metrics {
        m.sortition_eval_seconds.observe(block_seed_started.elapsed().as_secs_f64());
    }

    let candidate_txs = tx_pool.build_candidate_batch(MAX_TXS_PER_BLOCK);

    // Re-validate each candidate against its own snapshot in order,
    // accumulating total_fee from survivors only: a transaction that
    // fails (stale nonce, insufficient balance, ...) is silently
    // dropped rather than aborting the whole block.
    let validator_count = validators.size() as u64;
    let mut filter_snapshot = state_db.new_for_check();
    let mut included_txs = Vec::with_capacity(candidate_txs.len());
    for tx in &candidate_txs {
        if apply_tx_on_state(&mut filter_snapshot, tx, included_txs.len(), validator_count).is_ok() {
            included_txs.push(tx.clone());
        }
    }

    let body = Body {
        transactions: included_txs,
        block_seed: seed_output.hash,
        seed_proof: seed_output.proof,
    };
    let tx_root = body.tx_root();

    let mut header = Header::Proposed {
        parent_hash: input.parent_hash,
        height,
        time: input.time,
        proposer_pubkey: PublicKey(input.own_public_key.to_vec()),
        tx_root,
        state_root: crate::types::Hash256::zero(),
        coinbase: own_addr,
    };

    let draft = Block {
        header: header.clone(),
        body: Some(body.clone()),
    };
    // This pass only computes the state root for the header; it runs
    // against a throwaway snapshot that is never committed, so it does
    // not record tx/epoch metrics (those belong to the committing
    // apply_block call once this block is actually added to the chain).
    let mut snapshot = state_db.new_for_check();
    let state_root = apply_block(&mut snapshot, &draft, validators, economics, None)?;

    if let Header::Proposed {
        state_root: root_field,
        ..
    } = &mut header
    {
        *root_field = state_root;
    }

    tx_pool.reset_to(&candidate_txs);

    Ok(Some(Block {
        header,
        body: Some(body),
    }))
}
