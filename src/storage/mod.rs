//! Durable persistence for probe results.
//!
//! The `Store` trait abstracts over the backing engine. Two
//! implementations ship:
//!
//! - **SQLite** (default): embedded, WAL mode, survives restarts
//! - **In-memory**: no persistence, used by tests and as a fallback
//!
//! All implementations return history newest-first with ties broken by
//! descending row id, and compute windowed statistics in a single pass.

pub mod error;
pub mod memory;
pub mod sqlite;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duration::format_duration;
use crate::monitor::result::ProbeResult;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A persisted probe result with its row identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub site_name: String,
    pub url: String,
    pub status: u16,
    #[serde(with = "crate::duration::serde_ns")]
    pub duration: Duration,
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Windowed statistics for one site.
///
/// Response-time aggregates cover successful probes only and are zero
/// when the window holds none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub site_name: String,
    pub total_checks: i64,
    pub successful_checks: i64,
    pub failed_checks: i64,
    pub success_rate: f64,
    #[serde(with = "crate::duration::serde_ns")]
    pub avg_response_time: Duration,
    #[serde(with = "crate::duration::serde_ns")]
    pub min_response_time: Duration,
    #[serde(with = "crate::duration::serde_ns")]
    pub max_response_time: Duration,
    pub first_check: Option<DateTime<Utc>>,
    pub last_check: Option<DateTime<Utc>>,
    #[serde(with = "crate::duration::serde_ns")]
    pub uptime: Duration,
    #[serde(with = "crate::duration::serde_ns")]
    pub downtime: Duration,
}

impl Stats {
    /// Zeroed stats with the site name preserved, returned for empty
    /// windows.
    pub fn empty(site_name: &str) -> Self {
        Self {
            site_name: site_name.to_string(),
            total_checks: 0,
            successful_checks: 0,
            failed_checks: 0,
            success_rate: 0.0,
            avg_response_time: Duration::ZERO,
            min_response_time: Duration::ZERO,
            max_response_time: Duration::ZERO,
            first_check: None,
            last_check: None,
            uptime: Duration::ZERO,
            downtime: Duration::ZERO,
        }
    }

    /// Derive uptime/downtime as the share of the observed window span
    /// proportional to the success rate.
    pub fn derive_window_durations(&mut self) {
        if let (Some(first), Some(last)) = (self.first_check, self.last_check) {
            let span = (last - first).to_std().unwrap_or(Duration::ZERO);
            let up = span.mul_f64(self.success_rate / 100.0);
            self.uptime = up;
            self.downtime = span.saturating_sub(up);
        }
    }
}

impl std::fmt::Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} checks, {:.1}% uptime, avg: {}, last: {}",
            self.site_name,
            self.total_checks,
            self.success_rate,
            format_duration(self.avg_response_time),
            self.last_check
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string()),
        )
    }
}

/// Persistence contract for probe results.
///
/// Implementations must be safe under one concurrent writer per prober.
/// Write failures are transient and reported to the caller; they must
/// never take a prober down.
#[async_trait]
pub trait Store: Send + Sync {
    /// Idempotent schema creation.
    async fn init(&self) -> StorageResult<()>;

    /// Persist one probe result.
    async fn save_result(&self, result: &ProbeResult) -> StorageResult<()>;

    /// All entries for one site with `timestamp >= since`, newest first.
    async fn history(
        &self,
        site_name: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<HistoryEntry>>;

    /// All entries across sites with `timestamp >= since`, newest first.
    async fn all_history(&self, since: DateTime<Utc>) -> StorageResult<Vec<HistoryEntry>>;

    /// Windowed statistics for one site. An empty window yields zeroed
    /// stats, not an error.
    async fn stats(&self, site_name: &str, since: DateTime<Utc>) -> StorageResult<Stats>;

    /// Statistics for every site observed in the window.
    async fn all_stats(&self, since: DateTime<Utc>) -> StorageResult<HashMap<String, Stats>>;

    /// Release backing resources.
    async fn close(&self) -> StorageResult<()>;
}
