//! Top-level configuration for a chain node.
//!
//! This module aggregates configuration for:
//!
//! - persistent storage (RocksDB path and creation flags),
//! - metrics exporter (enable flag + listen address),
//! - the consensus economics knobs the executor and block applier read
//!   on every block (`EconomicsConfig`).
//!
//! The goal is to have a single `ChainConfig` struct that higher-level
//! binaries (e.g. the `node` crate) can construct from defaults,
//! config files, or environment variables as needed.

use std::net::SocketAddr;

use num_bigint::BigUint;

use crate::fee::DNA_BASE;
use crate::repository::RocksDbConfig;

/// An exact rate in `[0, 1]`, represented as a fraction rather than a
/// float so every node's fixed-point arithmetic is bit-reproducible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rate {
    pub numerator: u64,
    pub denominator: u64,
}

impl Rate {
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Truncating application of this rate to a big-integer amount:
    /// `ToInt(amount * rate)`, multiplying before dividing to avoid
    /// losing precision.
    pub fn apply_to_biguint(&self, amount: &BigUint) -> BigUint {
        (amount * BigUint::from(self.numerator)) / BigUint::from(self.denominator)
    }

    /// Truncating application of this rate to a plain integer count
    /// (used for committee sizing): `floor(n * rate)`.
    pub fn apply_to_count(&self, n: u64) -> u64 {
        (n * self.numerator) / self.denominator
    }
}

/// Network identifier distinguishing independent deployments of the
/// same chain software; folded into the genesis seed so mainnet and
/// testnet never share a randomness beacon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkId {
    Mainnet,
    Testnet,
}

impl NetworkId {
    pub fn tag(self) -> u8 {
        match self {
            NetworkId::Mainnet => 0x1,
            NetworkId::Testnet => 0x2,
        }
    }
}

/// Consensus economics knobs: block/fee rewards, sortition threshold,
/// committee sizing, and epoch length.
#[derive(Clone, Debug)]
pub struct EconomicsConfig {
    pub network_id: NetworkId,
    /// Flat per-block reward paid to the proposer's coinbase.
    pub block_reward: BigUint,
    /// Reward pool split across the final committee of a non-empty block.
    pub final_committee_reward: BigUint,
    /// Share of collected transaction fees that is burned rather than
    /// paid to the proposer.
    pub fee_burn_rate: Rate,
    /// Share of any reward (block or final-committee) that accrues to
    /// non-withdrawable stake instead of spendable balance.
    pub stake_reward_rate: Rate,
    /// Minimum VRF output fraction (of `2^256 - 1`) a node's eligibility
    /// proof must clear to propose.
    pub proposer_threshold: Rate,
    /// Fraction of the validator set sampled into a regular committee
    /// once the set exceeds the small fixed-table cutoff.
    pub committee_percent: Rate,
    /// Fraction of the validator set sampled into the larger final
    /// committee.
    pub final_committee_consensus_percent: Rate,
    /// Scaling factor applied to committee size to derive the
    /// Byzantine-agreement vote threshold once the set exceeds the
    /// small fixed-table cutoff.
    pub threshold_ba: Rate,
    /// Number of blocks between epoch advances.
    pub epoch_length: u64,
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        Self {
            network_id: NetworkId::Mainnet,
            block_reward: BigUint::from(DNA_BASE) * 20u32,
            final_committee_reward: BigUint::from(DNA_BASE) * 20u32,
            fee_burn_rate: Rate::new(500_000, 1_000_000),
            stake_reward_rate: Rate::new(500_000, 1_000_000),
            proposer_threshold: Rate::new(500_000, 1_000_000),
            committee_percent: Rate::new(300_000, 1_000_000),
            final_committee_consensus_percent: Rate::new(700_000, 1_000_000),
            threshold_ba: Rate::new(666_667, 1_000_000),
            epoch_length: 100,
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a chain node.
///
/// This aggregates all the sub-configs needed to wire up a typical
/// node: persistent storage (`storage`), consensus economics
/// (`economics`), and the Prometheus metrics exporter (`metrics`).
#[derive(Clone, Debug, Default)]
pub struct ChainConfig {
    pub storage: RocksDbConfig,
    pub economics: EconomicsConfig,
    pub metrics: MetricsConfig,
}
