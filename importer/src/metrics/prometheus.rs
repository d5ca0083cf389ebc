//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed import metrics, and an
//! async HTTP exporter that serves `/metrics` using `hyper`.

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

/// Import-loop Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated by the importer
/// as it walks the chain.
#[derive(Clone, Debug)]
pub struct ImportMetrics {
    /// Blocks successfully written to the store.
    pub blocks_imported: IntCounter,
    /// Raw block bytes successfully written to the store.
    pub bytes_imported: IntCounter,
    /// Latency of a single chain RPC call, in seconds.
    pub rpc_seconds: Histogram,
    /// Latency of a single store put, in seconds.
    pub store_put_seconds: Histogram,
    /// Runs that ended in failure.
    pub failures: IntCounter,
    /// Retried calls after a transport failure.
    pub retries: IntCounter,
}

impl ImportMetrics {
    /// Registers import metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let blocks_imported = IntCounter::with_opts(Opts::new(
            "import_blocks_total",
            "Total number of blocks written to the content-addressed store",
        ))?;
        registry.register(Box::new(blocks_imported.clone()))?;

        let bytes_imported = IntCounter::with_opts(Opts::new(
            "import_bytes_total",
            "Total number of raw block bytes written to the content-addressed store",
        ))?;
        registry.register(Box::new(bytes_imported.clone()))?;

        let rpc_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "import_rpc_seconds",
                "Latency of a single chain RPC call in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )?;
        registry.register(Box::new(rpc_seconds.clone()))?;

        // Large blocks can take a while to be parsed by the store.
        let store_put_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "import_store_put_seconds",
                "Latency of a single store put in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
        )?;
        registry.register(Box::new(store_put_seconds.clone()))?;

        let failures = IntCounter::with_opts(Opts::new(
            "import_failures_total",
            "Total number of import runs that stopped on an error",
        ))?;
        registry.register(Box::new(failures.clone()))?;

        let retries = IntCounter::with_opts(Opts::new(
            "import_retries_total",
            "Total number of calls retried after a transport failure",
        ))?;
        registry.register(Box::new(retries.clone()))?;

        Ok(Self {
            blocks_imported,
            bytes_imported,
            rpc_seconds,
            store_put_seconds,
            failures,
            retries,
        })
    }
}

/// Wrapper around a Prometheus registry and the import metrics.
///
/// This is the main handle passed to the importer and the exporter. It can
/// be wrapped in an [`Arc`] and shared across threads/tasks.
#[derive(Clone, Debug)]
pub struct MetricsRegistry {
    registry: Registry,
    pub import: ImportMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the import metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("dag".to_string()), None)?;
        let import = ImportMetrics::register(&registry)?;
        Ok(Self { registry, import })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Serves the import counters to Prometheus scrapers.
///
/// Listens on `addr` and answers `GET /metrics` with the text exposition
/// format of the registry the import loop records into. All other paths
/// return 404.
///
/// Intended to be spawned onto a Tokio runtime next to the (blocking)
/// import loop:
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9898".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving import metrics on /metrics");

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::debug!(%peer, "import metrics scrape failed: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (status, content_type, body) = route(req.method(), req.uri().path(), &metrics);

    let mut resp = Response::new(Full::new(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
    Ok(resp)
}

fn route(
    method: &Method,
    path: &str,
    metrics: &MetricsRegistry,
) -> (StatusCode, &'static str, Bytes) {
    match (method, path) {
        (&Method::GET, "/metrics") => (
            StatusCode::OK,
            "text/plain; version=0.0.4",
            Bytes::from(metrics.gather_text()),
        ),
        _ => (
            StatusCode::NOT_FOUND,
            "text/plain",
            Bytes::from_static(b"import metrics are served on /metrics"),
        ),
    }
}
