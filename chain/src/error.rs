//! Crate-wide error type.
//!
//! Every fallible operation in the engine funnels into [`ChainError`] so
//! callers can match on a single enum instead of threading per-module
//! error types through the public API.

use thiserror::Error;

use crate::types::Address;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("repository I/O error: {0}")]
    Repository(String),

    #[error("block {height} not found")]
    BlockNotFound { height: u64 },

    #[error("no canonical head recorded")]
    NoHead,

    #[error("state root mismatch: expected {expected}, computed {computed}")]
    StateRootMismatch { expected: String, computed: String },

    #[error("transaction {index} for account {account:?} has nonce {got}, expected {expected}")]
    BadNonce {
        index: usize,
        account: Address,
        expected: u32,
        got: u32,
    },

    #[error("transaction {index} for account {account:?} needs {needed} but balance is {have}")]
    InsufficientBalance {
        index: usize,
        account: Address,
        needed: String,
        have: String,
    },

    #[error("transaction {index} signature does not recover to the stated sender")]
    BadSignature { index: usize },

    #[error("transaction {index} targets identity {account:?} in state {state:?}, which cannot receive a {attempted:?}")]
    InvalidIdentityTransition {
        index: usize,
        account: Address,
        state: crate::types::IdentityState,
        attempted: &'static str,
    },

    #[error("invite sender {account:?} has no invite slots remaining")]
    NoInvitesRemaining { account: Address },

    #[error("block height {got} does not follow parent height {parent}")]
    BadHeight { parent: u64, got: u64 },

    #[error("block parent hash does not match the stored head")]
    BadParent,

    #[error("block time {got} is not after parent time {parent}")]
    BadTimestamp { parent: u64, got: u64 },

    #[error("sortition proof does not verify against proposer's public key")]
    InvalidSortitionProof,

    #[error("proposer is not eligible for this height: VRF output {vrf_value} does not clear threshold {threshold}")]
    NotEligible { vrf_value: String, threshold: String },

    #[error("proposer {account:?} is not a member of the active committee")]
    ProposerNotInCommittee { account: Address },

    #[error("block tx_root mismatch: header claims {expected}, computed {computed}")]
    InvalidTxRoot { expected: String, computed: String },

    #[error("transaction {index} for account {account:?} has epoch {tx_epoch}, chain epoch is {global_epoch}")]
    InvalidEpoch {
        index: usize,
        account: Address,
        tx_epoch: u16,
        global_epoch: u16,
    },

    #[error("transaction {index} for account {account:?} is a {kind_name} and must not carry a nonzero amount")]
    UnexpectedAmount {
        index: usize,
        account: Address,
        kind_name: &'static str,
    },

    #[error("RLP codec error: {0}")]
    Codec(#[from] rlp::DecoderError),

    #[error("transaction codec error: {0}")]
    Tx(#[from] crate::types::tx::TxError),

    #[error("metrics registration error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type ChainResult<T> = Result<T, ChainError>;
