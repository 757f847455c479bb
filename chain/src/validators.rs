//! Cache of the active validator set.
//!
//! The validator set only changes at epoch boundaries (when identities
//! are promoted, killed, or newly activated). Recomputing it from the
//! full identity map on every block would be wasteful, so
//! [`ValidatorsCache`] snapshots it once per epoch and serves reads
//! from that snapshot until the next refresh.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::config::EconomicsConfig;
use crate::state::Snapshot;
use crate::types::tx::TxKind;
use crate::types::{Address, Hash256, Transaction};

/// Fixed committee-vote thresholds for validator counts `1..=8`, read
/// from table position `n - 1`.
const FIXED_VOTE_THRESHOLDS: [usize; 8] = [1, 2, 2, 3, 3, 4, 4, 5];

/// Snapshot of the validator set for a single epoch.
#[derive(Clone, Debug, Default)]
pub struct ValidatorsCache {
    epoch: u16,
    members: BTreeMap<Address, BigUint>,
}

impl ValidatorsCache {
    pub fn new() -> Self {
        Self {
            epoch: 0,
            members: BTreeMap::new(),
        }
    }

    /// Number of addresses currently eligible to be sampled into a
    /// committee.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.members.contains_key(addr)
    }

    pub fn stake_of(&self, addr: &Address) -> BigUint {
        self.members.get(addr).cloned().unwrap_or_default()
    }

    /// Returns the full eligible set, in deterministic (address) order.
    pub fn actual_validators(&self) -> Vec<Address> {
        self.members.keys().copied().collect()
    }

    pub fn total_stake(&self) -> BigUint {
        self.members.values().fold(BigUint::default(), |acc, s| acc + s)
    }

    pub fn epoch(&self) -> u16 {
        self.epoch
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Rebuilds the cache from `snapshot` if `snapshot`'s epoch differs
    /// from the epoch this cache was last built for, or if `applied_txs`
    /// contains any transaction kind that can change which identities
    /// are alive mid-epoch (`Invite`, `Activation`, `Kill` all add to or
    /// remove from the eligibility set outside of an epoch advance).
    /// Returns `true` if a rebuild happened.
    pub fn refresh_if_updated(&mut self, snapshot: &Snapshot, applied_txs: &[Transaction]) -> bool {
        let current_epoch = snapshot.global().epoch;
        let epoch_changed = self.members.is_empty() || current_epoch != self.epoch;
        let identities_touched = applied_txs.iter().any(|tx| {
            matches!(
                tx.common.kind,
                TxKind::Invite | TxKind::Activation | TxKind::Kill
            )
        });
        if !epoch_changed && !identities_touched {
            return false;
        }
        self.members = snapshot
            .alive_identities()
            .map(|(addr, identity)| (*addr, identity.stake.clone()))
            .collect();
        self.epoch = current_epoch;
        true
    }

    /// Number of members a committee for this validator set should
    /// have: the full set below the fixed-table cutoff, else a
    /// configured percentage of it.
    pub fn committee_size(&self, final_committee: bool, economics: &EconomicsConfig) -> usize {
        let n = self.members.len();
        if n <= 8 {
            return n;
        }
        let percent = if final_committee {
            economics.final_committee_consensus_percent
        } else {
            economics.committee_percent
        };
        percent.apply_to_count(n as u64) as usize
    }

    /// Minimum number of committee votes needed for Byzantine-fault
    /// tolerant agreement: a fixed table for small validator sets, else
    /// `floor(N * percent * threshold_ba)`.
    pub fn committee_votes_threshold(&self, final_committee: bool, economics: &EconomicsConfig) -> usize {
        let n = self.members.len();
        if n == 0 {
            return 0;
        }
        if n <= 8 {
            return FIXED_VOTE_THRESHOLDS[n - 1];
        }
        let percent = if final_committee {
            economics.final_committee_consensus_percent
        } else {
            economics.committee_percent
        };
        let numerator = n as u128 * percent.numerator as u128 * economics.threshold_ba.numerator as u128;
        let denominator = percent.denominator as u128 * economics.threshold_ba.denominator as u128;
        if denominator == 0 {
            return n;
        }
        (numerator / denominator) as usize
    }

    /// Deterministically samples up to `limit.min(committee_size)`
    /// members from the current validator set, seeded by `seed` and
    /// `height` so every node draws the same committee. Order among
    /// members has no significance beyond being reproducible.
    pub fn sample_committee(&self, seed: &Hash256, height: u64, limit: usize, committee_size: usize) -> Vec<Address> {
        let pool: Vec<Address> = self.members.keys().copied().collect();
        let take = committee_size.min(limit).min(pool.len());
        if take == 0 {
            return Vec::new();
        }

        let mut digest_input = Vec::with_capacity(32 + 8);
        digest_input.extend_from_slice(seed.as_bytes());
        digest_input.extend_from_slice(&height.to_be_bytes());
        let digest = Hash256::compute(&digest_input);
        let mut rng_seed = [0u8; 32];
        rng_seed.copy_from_slice(digest.as_bytes());
        let mut rng = ChaCha20Rng::from_seed(rng_seed);

        let mut indices: Vec<usize> = (0..pool.len()).collect();
        for i in 0..take {
            let remaining = pool.len() - i;
            let j = i + (rng.next_u32() as usize) % remaining;
            indices.swap(i, j);
        }
        indices[..take].iter().map(|&i| pool[i]).collect()
    }
}
