//! sitewatch: a self-contained website availability and performance
//! monitor.
//!
//! Probers issue timed HTTP checks per site, persist every outcome to
//! an embedded SQLite store, and feed the alert engine synchronously.
//! The metrics engine derives windowed statistics on demand, and the
//! dashboard server exposes pull endpoints plus a WebSocket push
//! channel with live overview snapshots.

pub mod alerts;
pub mod cli;
pub mod config;
pub mod duration;
pub mod export;
pub mod metrics;
pub mod monitor;
pub mod reports;
pub mod storage;
pub mod web;

pub use alerts::{Alert, AlertEngine, AlertKind, Severity};
pub use config::{Config, SiteConfig};
pub use monitor::{Prober, ProbeResult, Scheduler};
pub use storage::{HistoryEntry, MemoryStore, SqliteStore, Stats, Store};
