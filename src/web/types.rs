use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::Stats;

/// Dashboard overview snapshot pushed to subscribers and served from
/// `/api/overview`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewResponse {
    pub total_sites: usize,
    pub healthy_sites: usize,
    pub total_checks: i64,
    pub successful_checks: i64,
    pub overall_uptime: f64,
    pub sites: Vec<SiteOverview>,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteOverview {
    pub name: String,
    /// One of `healthy`, `degraded`, `down`, `stale`.
    pub status: String,
    pub uptime: f64,
    pub response_time_ms: i64,
    pub last_check: Option<DateTime<Utc>>,
    pub total_checks: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteInfo {
    pub name: String,
    pub url: String,
    pub interval: String,
    pub timeout: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertStatus {
    pub email_enabled: bool,
    pub webhook_enabled: bool,
    pub total_channels: usize,
}

/// How long a site may go unprobed before the overview calls it stale.
pub const STALE_AFTER_SECS: i64 = 10 * 60;

/// Status label for one site's windowed stats. Rate buckets first
/// (down below 80, degraded below 99), then staleness overrides.
pub fn status_label(stats: &Stats, now: DateTime<Utc>) -> &'static str {
    let mut status = if stats.success_rate < 80.0 {
        "down"
    } else if stats.success_rate < 99.0 {
        "degraded"
    } else {
        "healthy"
    };

    match stats.last_check {
        Some(last) if now.signed_duration_since(last).num_seconds() <= STALE_AFTER_SECS => {}
        _ => status = "stale",
    }

    status
}

/// Build the overview snapshot from per-site stats.
pub fn make_overview(all_stats: &HashMap<String, Stats>, now: DateTime<Utc>) -> OverviewResponse {
    let mut overview = OverviewResponse {
        total_sites: all_stats.len(),
        healthy_sites: 0,
        total_checks: 0,
        successful_checks: 0,
        overall_uptime: 0.0,
        sites: Vec::with_capacity(all_stats.len()),
        last_update: now,
    };

    for stats in all_stats.values() {
        overview.total_checks += stats.total_checks;
        overview.successful_checks += stats.successful_checks;
        if stats.success_rate >= 99.0 {
            overview.healthy_sites += 1;
        }

        overview.sites.push(SiteOverview {
            name: stats.site_name.clone(),
            status: status_label(stats, now).to_string(),
            uptime: stats.success_rate,
            response_time_ms: stats.avg_response_time.as_millis() as i64,
            last_check: stats.last_check,
            total_checks: stats.total_checks,
        });
    }

    overview.sites.sort_by(|a, b| a.name.cmp(&b.name));

    if overview.total_checks > 0 {
        overview.overall_uptime =
            overview.successful_checks as f64 / overview.total_checks as f64 * 100.0;
    }

    overview
}
