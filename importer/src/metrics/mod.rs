//! Metrics and instrumentation for the importer.
//!
//! This module defines Prometheus-compatible metrics for the import loop
//! and exposes a small HTTP exporter that serves `/metrics` in Prometheus
//! text format.
//!
//! Typical usage in a binary:
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use importer::metrics::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! let addr: SocketAddr = "127.0.0.1:9898".parse()?;
//!
//! // Spawn the HTTP exporter in the background:
//! tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
//!
//! // Hand the registry to the importer:
//! let importer = Importer::new(reader, writer, codec, options).with_metrics(registry);
//! ```

pub mod prometheus;

pub use self::prometheus::{ImportMetrics, MetricsRegistry, run_prometheus_http_server};
