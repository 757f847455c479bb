//! Node configuration.
//!
//! For now this only configures the HTTP listen address and block
//! producer cadence. The underlying chain configuration is taken from
//! `chain::ChainConfig::default()`.

use std::net::SocketAddr;

/// Configuration for the node's HTTP server and block producer loop.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
    /// Seconds between block producer attempts.
    pub block_interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        // Bind to all interfaces so the container port mapping is
        // reachable from the host when running under docker-compose.
        let addr: SocketAddr = "0.0.0.0:8081"
            .parse()
            .expect("hard-coded API listen address should parse");
        Self {
            listen_addr: addr,
            block_interval_secs: 5,
        }
    }
}
