//! Chain library crate.
//!
//! This crate provides the core building blocks of an identity-based
//! proof-of-stake block-processing engine:
//!
//! - strongly-typed domain types (`types`),
//! - versioned world state (`state`),
//! - durable block/metadata storage (`repository`),
//! - the active validator set (`validators`),
//! - VRF-based proposer sortition (`sortition`),
//! - fee and reward arithmetic (`fee`),
//! - transaction execution (`executor`),
//! - whole-block application (`block_applier`),
//! - block proposal (`proposer`) and validation (`validator`),
//! - the `Chain` façade tying all of the above together,
//! - Prometheus-based metrics (`metrics`),
//! - and top-level node configuration (`config`).

pub mod block_applier;
pub mod chain;
pub mod config;
pub mod error;
pub mod executor;
pub mod fee;
pub mod metrics;
pub mod proposer;
pub mod repository;
pub mod sortition;
pub mod state;
pub mod types;
pub mod validator;
pub mod validators;

pub use chain::Chain;
pub use config::{ChainConfig, EconomicsConfig, MetricsConfig, NetworkId, Rate};
pub use error::{ChainError, ChainResult};
pub use metrics::{ChainMetrics, MetricsRegistry, run_prometheus_http_server};
pub use proposer::{propose, ProposalInput, ProposerError, TxPool};
pub use repository::{InMemoryRepository, Repository, RocksDbConfig, RocksDbRepository};
pub use sortition::{EcvrfP256Sha256Tai, SortitionError, Vrf, VrfOutput};
pub use state::{InMemoryStateDB, Snapshot, StateDB};
pub use validator::{validate_proposed_block, validate_proposer_proof};
pub use validators::ValidatorsCache;

// Re-export domain types at the crate root for convenience.
pub use types::*;
