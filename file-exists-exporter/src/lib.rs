//! Prometheus exporter reporting whether filesystem paths exist.
//!
//! For every configured path the exporter serves a `file_exists` gauge that is
//! `1` when the path can be stat'ed and `0` otherwise. Paths are checked on
//! every scrape; nothing is cached.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Config / CLI   │────>│    Collector    │<────│   HTTP Server   │
//! │ (paths, fixed)  │     │  (stat per path)│     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! file-exists-exporter -config /etc/exporter/config.json
//! file-exists-exporter -file /var/run/app.pid -file /srv/data -listen-address :9100
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] and [`config::PathSource`].

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod http;

pub use collector::{FileCollector, SharedCollector};
pub use config::{ExporterConfig, MonitoredPath, PathSource};
pub use error::{Error, Result};
pub use http::HttpServer;
