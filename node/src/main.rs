// node/src/main.rs

//! Node binary.
//!
//! This binary exposes a small HTTP API on top of the `chain` crate:
//!
//! - `GET /health`
//! - `GET /chain/head`
//! - `POST /transactions`
//!
//! It embeds a `chain::Chain` (RocksDB-backed repository, in-memory
//! state), a simple queued transaction pool, a background block
//! producer loop, and a Prometheus metrics exporter on `/metrics`.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;

use chain::{
    Block, Chain, EcvrfP256Sha256Tai, Hash256, Header, InMemoryStateDB, MetricsRegistry,
    RocksDbRepository, run_prometheus_http_server,
};
use config::NodeConfig;
use routes::{chain_head, health, transactions};
use state::{AppState, ProposerIdentity, QueuedTxPool, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "node=info,chain=info".to_string()))
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let node_cfg = NodeConfig::default();
    let chain_cfg = chain::ChainConfig::default();

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if chain_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = chain_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Repository + chain façade
    // ---------------------------

    let repository = RocksDbRepository::open(&chain_cfg.storage)
        .map_err(|e| format!("failed to open RocksDB repository at {:?}: {e}", chain_cfg.storage.path))?;

    let seed_preimage = [1u8, 2, 3, 4, 5, 6, chain_cfg.economics.network_id.tag()];
    let genesis = Block {
        header: Header::Empty {
            parent_hash: chain::BlockHash(Hash256::zero()),
            height: 1,
            state_root: Hash256::zero(),
        },
        body: Some(chain::Body {
            transactions: vec![],
            block_seed: Hash256::compute(&seed_preimage),
            seed_proof: vec![],
        }),
    };

    let engine: Chain<RocksDbRepository, InMemoryStateDB, EcvrfP256Sha256Tai> = Chain::genesis(
        repository,
        InMemoryStateDB::new(),
        EcvrfP256Sha256Tai,
        chain_cfg.economics.clone(),
        genesis,
    )
    .map_err(|e| format!("failed to bootstrap genesis: {e}"))?
    .with_metrics(Arc::new(metrics.chain.clone()));

    // ---------------------------
    // Proposer identity + tx pool
    // ---------------------------

    // A production node loads this from a keystore; derived from a
    // fixed seed here so the node is reproducible out of the box.
    let proposer = ProposerIdentity {
        secret_key: Hash256::compute(b"node-proposer-secret").as_bytes().to_vec(),
        public_key: vec![4u8; 64],
    };

    let tx_pool = QueuedTxPool::new();

    // ---------------------------
    // Shared state
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState {
        chain: tokio::sync::Mutex::new(engine),
        tx_pool: tokio::sync::Mutex::new(tx_pool),
        proposer,
        metrics: metrics.clone(),
    });

    // ---------------------------
    // Block producer loop
    // ---------------------------

    let block_interval_secs = node_cfg.block_interval_secs;
    let producer_state = app_state.clone();
    tokio::spawn(async move {
        run_block_producer(producer_state, block_interval_secs).await;
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/chain/head", get(chain_head::chain_head))
        .route("/transactions", post(transactions::submit_transaction))
        .with_state(app_state);

    tracing::info!("node listening on http://{}", node_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(node_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", node_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Background block producer loop.
///
/// Periodically asks the chain façade to attempt sortition and, on a
/// win, propose and commit a new block using the queued transaction
/// pool.
async fn run_block_producer(state: SharedState, interval_secs: u64) {
    let interval = std::time::Duration::from_secs(interval_secs.max(1));
    tracing::info!("block producer running with interval {}s", interval.as_secs());

    loop {
        let start = std::time::Instant::now();
        let timestamp = current_unix_timestamp();

        {
            let mut chain_guard = state.chain.lock().await;
            let mut pool_guard = state.tx_pool.lock().await;

            match chain_guard.propose_and_add(
                &state.proposer.secret_key,
                &state.proposer.public_key,
                timestamp,
                &mut *pool_guard,
            ) {
                Ok(Some(block)) => {
                    let elapsed = start.elapsed().as_secs_f64();
                    state.metrics.chain.block_apply_seconds.observe(elapsed);
                    tracing::info!(height = block.height(), "proposed block");
                }
                Ok(None) => {
                    tracing::debug!("not eligible to propose at this height");
                }
                Err(e) => {
                    tracing::warn!("failed to propose block: {e}");
                }
            }
        }

        tokio::time::sleep(interval).await;
    }
}

/// Returns the current wall-clock time as seconds since Unix epoch.
fn current_unix_timestamp() -> u64 {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
