//! Shared application state and transaction pool implementation.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use chain::{
    Chain, EcvrfP256Sha256Tai, InMemoryStateDB, MetricsRegistry, RocksDbRepository, Transaction,
    TxPool,
};

/// Simple in-memory transaction pool backed by a FIFO queue.
///
/// HTTP handlers push transactions into the queue; the block producer
/// drains them when constructing blocks.
#[derive(Default)]
pub struct QueuedTxPool {
    queue: VecDeque<Transaction>,
}

impl QueuedTxPool {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Enqueues a new transaction to be included in a future block.
    pub fn push(&mut self, tx: Transaction) {
        self.queue.push_back(tx);
    }
}

impl TxPool for QueuedTxPool {
    fn build_candidate_batch(&self, max_txs: usize) -> Vec<Transaction> {
        self.queue.iter().take(max_txs).cloned().collect()
    }

    fn reset_to(&mut self, applied: &[Transaction]) {
        let applied_hashes: std::collections::HashSet<_> =
            applied.iter().map(|tx| tx.hash()).collect();
        self.queue.retain(|tx| !applied_hashes.contains(&tx.hash()));
    }
}

/// Node-local proposer key material.
///
/// A production node would load this from a keystore; here it is
/// derived from a fixed seed so the node is reproducible out of the box.
pub struct ProposerIdentity {
    pub secret_key: Vec<u8>,
    pub public_key: Vec<u8>,
}

pub type Engine = Chain<RocksDbRepository, InMemoryStateDB, EcvrfP256Sha256Tai>;

/// Shared state held by the API and background tasks.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via
/// Axum's `State` extractor. The `chain` mutex enforces the
/// single-writer discipline the engine requires: only one task at a
/// time may propose or accept a block.
pub struct AppState {
    pub chain: Mutex<Engine>,
    pub tx_pool: Mutex<QueuedTxPool>,
    pub proposer: ProposerIdentity,
    pub metrics: Arc<MetricsRegistry>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
