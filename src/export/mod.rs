//! Data export over the store: windowed history with optional
//! aggregate statistics, rendered as JSON, CSV, or HTML.

pub mod formatters;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{HistoryEntry, Stats, Store};

pub use formatters::{formatter_for, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Html,
}

impl ExportFormat {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "html" => Ok(ExportFormat::Html),
            other => anyhow::bail!("unsupported format '{other}'. Supported formats: json, csv, html"),
        }
    }

    pub fn all() -> [ExportFormat; 3] {
        [ExportFormat::Json, ExportFormat::Csv, ExportFormat::Html]
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON - Machine-readable structured data",
            ExportFormat::Csv => "CSV - Spreadsheet compatible comma-separated values",
            ExportFormat::Html => "HTML - Human-readable web page report",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Html => write!(f, "html"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Empty = all sites.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub site_name: String,
    #[serde(with = "crate::duration::serde_ns")]
    pub since: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
    pub limit: usize,
    pub include_stats: bool,
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            site_name: String::new(),
            since: Duration::from_secs(24 * 3600),
            until: None,
            limit: 0,
            include_stats: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportData {
    pub metadata: ExportMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ExportStats>,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportMetadata {
    pub generated_at: DateTime<Utc>,
    pub format: ExportFormat,
    pub total_records: usize,
    pub sites_included: Vec<String>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportStats {
    pub total_sites: usize,
    pub total_checks: i64,
    pub successful_checks: i64,
    pub failed_checks: i64,
    pub overall_uptime_percent: f64,
    #[serde(with = "crate::duration::serde_ns")]
    pub avg_response_time: Duration,
    #[serde(with = "crate::duration::serde_ns")]
    pub min_response_time: Duration,
    #[serde(with = "crate::duration::serde_ns")]
    pub max_response_time: Duration,
    pub site_stats: HashMap<String, Stats>,
}

pub struct Exporter {
    store: Arc<dyn Store>,
}

impl Exporter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Load the windowed history and assemble the export dataset.
    pub async fn export(&self, opts: &ExportOptions) -> anyhow::Result<ExportData> {
        let now = Utc::now();
        let from = now
            - chrono::Duration::from_std(opts.since).unwrap_or_else(|_| chrono::Duration::hours(24));
        let to = opts.until.unwrap_or(now);

        let mut history = if opts.site_name.is_empty() {
            self.store.all_history(from).await?
        } else {
            self.store.history(&opts.site_name, from).await?
        };

        if opts.until.is_some() {
            history.retain(|e| e.timestamp <= to);
        }
        if opts.limit > 0 && history.len() > opts.limit {
            history.truncate(opts.limit);
        }

        let sites_included = sites_in(&history);

        let stats = if opts.include_stats {
            Some(self.aggregate_stats(&history, &sites_included, from).await?)
        } else {
            None
        };

        Ok(ExportData {
            metadata: ExportMetadata {
                generated_at: now,
                format: opts.format,
                total_records: history.len(),
                sites_included,
                from,
                to,
            },
            stats,
            history,
        })
    }

    async fn aggregate_stats(
        &self,
        history: &[HistoryEntry],
        sites: &[String],
        from: DateTime<Utc>,
    ) -> anyhow::Result<ExportStats> {
        let total_checks = history.len() as i64;
        let successful: Vec<_> = history.iter().filter(|e| e.success).collect();
        let successful_checks = successful.len() as i64;

        let (avg, min, max) = if successful.is_empty() {
            (Duration::ZERO, Duration::ZERO, Duration::ZERO)
        } else {
            let total: Duration = successful.iter().map(|e| e.duration).sum();
            (
                total / successful.len() as u32,
                successful.iter().map(|e| e.duration).min().unwrap_or_default(),
                successful.iter().map(|e| e.duration).max().unwrap_or_default(),
            )
        };

        let mut site_stats = HashMap::new();
        for site in sites {
            site_stats.insert(site.clone(), self.store.stats(site, from).await?);
        }

        Ok(ExportStats {
            total_sites: sites.len(),
            total_checks,
            successful_checks,
            failed_checks: total_checks - successful_checks,
            overall_uptime_percent: if total_checks > 0 {
                successful_checks as f64 / total_checks as f64 * 100.0
            } else {
                0.0
            },
            avg_response_time: avg,
            min_response_time: min,
            max_response_time: max,
            site_stats,
        })
    }
}

fn sites_in(history: &[HistoryEntry]) -> Vec<String> {
    let mut sites: Vec<String> = history
        .iter()
        .map(|e| e.site_name.clone())
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    sites.sort();
    sites
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::result::ProbeResult;
    use crate::storage::MemoryStore;

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let base = Utc::now() - chrono::Duration::hours(1);
        for i in 0..10 {
            let site = if i % 2 == 0 { "A" } else { "B" };
            store
                .save_result(&ProbeResult {
                    site_name: site.to_string(),
                    url: format!("https://{}.example.com", site.to_lowercase()),
                    status: if i == 4 { 500 } else { 200 },
                    duration: Duration::from_millis(100 + i * 10),
                    timestamp: base + chrono::Duration::minutes(i as i64),
                    success: i != 4,
                    error: String::new(),
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn export_discovers_sites_and_counts() {
        let store = seeded_store().await;
        let exporter = Exporter::new(store);

        let data = exporter
            .export(&ExportOptions::new(ExportFormat::Json))
            .await
            .unwrap();
        assert_eq!(data.metadata.total_records, 10);
        assert_eq!(data.metadata.sites_included, vec!["A", "B"]);
        assert!(data.stats.is_none());
    }

    #[tokio::test]
    async fn export_filters_by_site_and_limit() {
        let store = seeded_store().await;
        let exporter = Exporter::new(store);

        let mut opts = ExportOptions::new(ExportFormat::Json);
        opts.site_name = "A".to_string();
        opts.limit = 3;

        let data = exporter.export(&opts).await.unwrap();
        assert_eq!(data.history.len(), 3);
        assert!(data.history.iter().all(|e| e.site_name == "A"));
    }

    #[tokio::test]
    async fn export_with_stats_aggregates() {
        let store = seeded_store().await;
        let exporter = Exporter::new(store);

        let mut opts = ExportOptions::new(ExportFormat::Json);
        opts.include_stats = true;

        let data = exporter.export(&opts).await.unwrap();
        let stats = data.stats.unwrap();
        assert_eq!(stats.total_sites, 2);
        assert_eq!(stats.total_checks, 10);
        assert_eq!(stats.successful_checks, 9);
        assert_eq!(stats.failed_checks, 1);
        assert!((stats.overall_uptime_percent - 90.0).abs() < 0.001);
        assert!(stats.site_stats.contains_key("A"));
        assert!(stats.site_stats.contains_key("B"));
    }

    #[tokio::test]
    async fn json_export_round_trips_entry_set() {
        let store = seeded_store().await;
        let exporter = Exporter::new(store);

        let data = exporter
            .export(&ExportOptions::new(ExportFormat::Json))
            .await
            .unwrap();
        let rendered = formatter_for(ExportFormat::Json).format(&data).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        let entries: Vec<HistoryEntry> =
            serde_json::from_value(parsed["history"].clone()).unwrap();

        let mut original: Vec<i64> = data.history.iter().map(|e| e.id).collect();
        let mut round_tripped: Vec<i64> = entries.iter().map(|e| e.id).collect();
        original.sort();
        round_tripped.sort();
        assert_eq!(original, round_tripped);
        assert_eq!(entries.len(), data.history.len());
    }
}
