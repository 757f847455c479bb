//! Applies a block's transactions and epoch-advance logic to a
//! [`Snapshot`], producing the resulting state root.
//!
//! This module is deliberately unaware of whether the block came from a
//! local proposer or a remote peer: [`crate::proposer`] calls it to
//! discover the state root a candidate block would produce, and
//! [`crate::validator`] calls it again to check a received block's
//! claimed root actually matches.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::config::EconomicsConfig;
use crate::error::ChainResult;
use crate::executor::apply_tx_on_state;
use crate::fee::{split_collected_fees, split_reward};
use crate::metrics::ChainMetrics;
use crate::state::Snapshot;
use crate::types::{Block, Global, Hash256, Header, IdentityState};
use crate::validators::ValidatorsCache;

/// Maximum number of final-committee members considered when splitting
/// the final-committee reward, matching the sampling cap used elsewhere.
const FINAL_COMMITTEE_SAMPLE_LIMIT: usize = 1_000;

/// Applies `block` to `snapshot` in place: executes every transaction
/// in order, credits the proposer and final committee (non-empty
/// blocks only), and advances the epoch if this block crosses the
/// epoch boundary. Returns the resulting commitment root.
pub fn apply_block(
    snapshot: &mut Snapshot,
    block: &Block,
    validators: &ValidatorsCache,
    economics: &EconomicsConfig,
    metrics: Option<&ChainMetrics>,
) -> ChainResult<Hash256> {
    let validator_count = validators.size() as u64;
    let mut total_fee = BigUint::zero();

    for (index, tx) in block.transactions().iter().enumerate() {
        match apply_tx_on_state(snapshot, tx, index, validator_count) {
            Ok(fee) => {
                total_fee += fee;
                if let Some(m) = metrics {
                    m.txs_applied_total.inc();
                }
            }
            Err(e) => {
                if let Some(m) = metrics {
                    m.txs_rejected_total.inc();
                }
                return Err(e);
            }
        }
    }

    if let (Header::Proposed { coinbase, .. }, Some(body)) = (&block.header, &block.body) {
        credit_block_reward(snapshot, *coinbase, &total_fee, economics);
        credit_final_committee_reward(snapshot, validators, body.block_seed, block.height(), economics);
    }

    maybe_advance_epoch(snapshot, block.height(), economics, metrics);

    Ok(snapshot.commitment_root())
}

fn credit_block_reward(snapshot: &mut Snapshot, coinbase: crate::types::Address, total_fee: &BigUint, economics: &EconomicsConfig) {
    let (stake_share, balance_share) = split_reward(&economics.block_reward, economics.stake_reward_rate);
    let (_burn, fee_reward) = split_collected_fees(total_fee, economics.fee_burn_rate);

    let mut account = snapshot.account(&coinbase);
    account.balance += &balance_share + &fee_reward;
    snapshot.set_account(coinbase, account);

    let mut identity = snapshot.identity(&coinbase);
    identity.stake += stake_share;
    identity.invites_remaining = identity.invites_remaining.saturating_add(1);
    snapshot.set_identity(coinbase, identity);
}

fn credit_final_committee_reward(
    snapshot: &mut Snapshot,
    validators: &ValidatorsCache,
    seed: Hash256,
    height: u64,
    economics: &EconomicsConfig,
) {
    let committee_size = validators.committee_size(true, economics);
    let committee = validators.sample_committee(&seed, height, FINAL_COMMITTEE_SAMPLE_LIMIT, committee_size);
    if committee.is_empty() {
        return;
    }

    let per_member = &economics.final_committee_reward / BigUint::from(committee.len() as u64);
    let (stake_share, balance_share) = split_reward(&per_member, economics.stake_reward_rate);

    for member in committee {
        let mut account = snapshot.account(&member);
        account.balance += &balance_share;
        snapshot.set_account(member, account);

        let mut identity = snapshot.identity(&member);
        identity.stake += &stake_share;
        snapshot.set_identity(member, identity);
    }
}

fn maybe_advance_epoch(snapshot: &mut Snapshot, height: u64, economics: &EconomicsConfig, metrics: Option<&ChainMetrics>) {
    let global = snapshot.global();
    if height < global.next_epoch_block {
        return;
    }
    snapshot.promote_candidates();
    snapshot.set_global(Global {
        epoch: global.epoch + 1,
        next_epoch_block: global.next_epoch_block + economics.epoch_length,
    });
    if let Some(m) = metrics {
        m.epoch_transitions_total.inc();
    }
}
