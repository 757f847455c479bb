//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed engine metrics, and an async
//! HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

/// Block-processing metrics.
///
/// These are registered into a [`Registry`] and updated from the
/// executor, block applier, and sortition code.
#[derive(Clone)]
pub struct ChainMetrics {
    /// Latency of applying a full block (transactions + epoch advance), in seconds.
    pub block_apply_seconds: Histogram,
    /// Latency of a single VRF sortition evaluation, in seconds.
    pub sortition_eval_seconds: Histogram,
    /// Number of transactions successfully applied.
    pub txs_applied_total: IntCounter,
    /// Number of transactions rejected during execution.
    pub txs_rejected_total: IntCounter,
    /// Number of epoch transitions the chain has advanced through.
    pub epoch_transitions_total: IntCounter,
    /// Number of blocks rejected during validation.
    pub blocks_rejected_total: IntCounter,
}

impl ChainMetrics {
    /// Registers engine metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let block_apply_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "chain_block_apply_seconds",
                "Time to apply a block's transactions and epoch advance, in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
        )?;
        registry.register(Box::new(block_apply_seconds.clone()))?;

        let sortition_eval_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "chain_sortition_eval_seconds",
                "Time to evaluate a VRF sortition proof, in seconds",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1]),
        )?;
        registry.register(Box::new(sortition_eval_seconds.clone()))?;

        let txs_applied_total = IntCounter::with_opts(Opts::new(
            "chain_txs_applied_total",
            "Total number of transactions successfully applied",
        ))?;
        registry.register(Box::new(txs_applied_total.clone()))?;

        let txs_rejected_total = IntCounter::with_opts(Opts::new(
            "chain_txs_rejected_total",
            "Total number of transactions rejected during execution",
        ))?;
        registry.register(Box::new(txs_rejected_total.clone()))?;

        let epoch_transitions_total = IntCounter::with_opts(Opts::new(
            "chain_epoch_transitions_total",
            "Total number of epoch transitions applied",
        ))?;
        registry.register(Box::new(epoch_transitions_total.clone()))?;

        let blocks_rejected_total = IntCounter::with_opts(Opts::new(
            "chain_blocks_rejected_total",
            "Total number of blocks rejected during validation",
        ))?;
        registry.register(Box::new(blocks_rejected_total.clone()))?;

        Ok(Self {
            block_apply_seconds,
            sortition_eval_seconds,
            txs_applied_total,
            txs_rejected_total,
            epoch_transitions_total,
            blocks_rejected_total,
        })
    }
}

/// Wrapper around a Prometheus registry and the engine metrics.
///
/// This is the main handle you pass around in the node. It can be
/// wrapped in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub chain: ChainMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the engine metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let chain = ChainMetrics::register(&registry)?;
        Ok(Self { registry, chain })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            eprintln!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                eprintln!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn chain_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ChainMetrics::register(&registry).expect("register metrics");

        metrics.block_apply_seconds.observe(0.01);
        metrics.sortition_eval_seconds.observe(0.002);
        metrics.txs_applied_total.inc();
        metrics.epoch_transitions_total.inc();
        metrics.blocks_rejected_total.inc();

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.chain.block_apply_seconds.observe(0.01);
        let text = registry.gather_text();
        assert!(text.contains("chain_block_apply_seconds"));
    }
}
