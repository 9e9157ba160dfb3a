//! In-memory store (no persistence).
//!
//! Keeps every entry in a vector behind a read-write lock. Useful for
//! tests and for running without a database file; all data is lost on
//! restart.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::error::StorageResult;
use super::{HistoryEntry, Stats, Store};
use crate::monitor::result::ProbeResult;

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: Vec<HistoryEntry>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn compute_stats(site_name: &str, entries: &[&HistoryEntry]) -> Stats {
        if entries.is_empty() {
            return Stats::empty(site_name);
        }

        let total = entries.len() as i64;
        let successful: Vec<_> = entries.iter().filter(|e| e.success).collect();
        let success_count = successful.len() as i64;

        let (avg, min, max) = if successful.is_empty() {
            (Duration::ZERO, Duration::ZERO, Duration::ZERO)
        } else {
            let sum: Duration = successful.iter().map(|e| e.duration).sum();
            let avg = sum / successful.len() as u32;
            let min = successful.iter().map(|e| e.duration).min().unwrap_or_default();
            let max = successful.iter().map(|e| e.duration).max().unwrap_or_default();
            (avg, min, max)
        };

        let mut stats = Stats {
            site_name: site_name.to_string(),
            total_checks: total,
            successful_checks: success_count,
            failed_checks: total - success_count,
            success_rate: success_count as f64 / total as f64 * 100.0,
            avg_response_time: avg,
            min_response_time: min,
            max_response_time: max,
            first_check: entries.iter().map(|e| e.timestamp).min(),
            last_check: entries.iter().map(|e| e.timestamp).max(),
            uptime: Duration::ZERO,
            downtime: Duration::ZERO,
        };
        stats.derive_window_durations();
        stats
    }

    fn sorted_newest_first(mut entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        entries
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn init(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn save_result(&self, result: &ProbeResult) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.entries.push(HistoryEntry {
            id,
            site_name: result.site_name.clone(),
            url: result.url.clone(),
            status: result.status,
            duration: result.duration,
            success: result.success,
            error: result.error.clone(),
            timestamp: result.timestamp,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn history(
        &self,
        site_name: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<HistoryEntry>> {
        let inner = self.inner.read().await;
        let matching = inner
            .entries
            .iter()
            .filter(|e| e.site_name == site_name && e.timestamp >= since)
            .cloned()
            .collect();
        Ok(Self::sorted_newest_first(matching))
    }

    async fn all_history(&self, since: DateTime<Utc>) -> StorageResult<Vec<HistoryEntry>> {
        let inner = self.inner.read().await;
        let matching = inner
            .entries
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect();
        Ok(Self::sorted_newest_first(matching))
    }

    async fn stats(&self, site_name: &str, since: DateTime<Utc>) -> StorageResult<Stats> {
        let inner = self.inner.read().await;
        let matching: Vec<_> = inner
            .entries
            .iter()
            .filter(|e| e.site_name == site_name && e.timestamp >= since)
            .collect();
        Ok(Self::compute_stats(site_name, &matching))
    }

    async fn all_stats(&self, since: DateTime<Utc>) -> StorageResult<HashMap<String, Stats>> {
        let inner = self.inner.read().await;
        let mut by_site: HashMap<&str, Vec<&HistoryEntry>> = HashMap::new();
        for entry in inner.entries.iter().filter(|e| e.timestamp >= since) {
            by_site.entry(&entry.site_name).or_default().push(entry);
        }

        Ok(by_site
            .into_iter()
            .map(|(name, entries)| (name.to_string(), Self::compute_stats(name, &entries)))
            .collect())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
