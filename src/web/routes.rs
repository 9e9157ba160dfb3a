//! JSON pull endpoints for the dashboard.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::duration::parse_duration;
use crate::export::{formatter_for, ExportFormat, ExportOptions, Exporter};
use crate::storage::{HistoryEntry, Stats};

use super::error::{ApiError, ApiResult};
use super::types::{make_overview, AlertStatus, OverviewResponse, SiteInfo};
use super::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Resolve an optional `since` duration parameter into an absolute
/// timestamp. Missing or unparseable values fall back to 24 hours; a
/// bad value is logged, never a client error.
fn resolve_since(param: Option<&str>) -> DateTime<Utc> {
    let default = chrono::Duration::hours(24);
    let window = match param {
        None => default,
        Some(raw) => match parse_duration(raw) {
            Ok(d) => chrono::Duration::from_std(d).unwrap_or(default),
            Err(e) => {
                warn!("ignoring unparseable since parameter '{raw}': {e}");
                default
            }
        },
    };
    Utc::now() - window
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    since: Option<String>,
}

/// GET /api/overview
pub async fn overview(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Json<OverviewResponse>> {
    let since = resolve_since(query.since.as_deref());
    let all_stats = state.store.all_stats(since).await?;
    Ok(Json(make_overview(&all_stats, Utc::now())))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    site: Option<String>,
    since: Option<String>,
}

/// GET /api/stats
///
/// With a `site` filter returns that site's stats; otherwise a map of
/// every site observed in the window.
pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let since = resolve_since(query.since.as_deref());

    let value = match query.site.as_deref() {
        Some(site) if !site.is_empty() => {
            let stats: Stats = state.store.stats(site, since).await?;
            serde_json::to_value(stats).map_err(|e| ApiError::Internal(e.to_string()))?
        }
        _ => {
            let all: HashMap<String, Stats> = state.store.all_stats(since).await?;
            serde_json::to_value(all).map_err(|e| ApiError::Internal(e.to_string()))?
        }
    };

    Ok(Json(value))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    site: Option<String>,
    since: Option<String>,
    limit: Option<usize>,
}

/// GET /api/history
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let since = resolve_since(query.since.as_deref());
    let limit = query.limit.filter(|&l| l > 0).unwrap_or(DEFAULT_HISTORY_LIMIT);

    let mut entries = match query.site.as_deref() {
        Some(site) if !site.is_empty() => state.store.history(site, since).await?,
        _ => state.store.all_history(since).await?,
    };

    if entries.len() > limit {
        entries.truncate(limit);
    }

    Ok(Json(entries))
}

/// GET /api/sites
pub async fn sites(State(state): State<AppState>) -> Json<Vec<SiteInfo>> {
    let sites = state
        .config
        .sites
        .iter()
        .map(|site| SiteInfo {
            name: site.name.clone(),
            url: site.url.clone(),
            interval: site.interval.clone(),
            timeout: site.timeout.clone(),
        })
        .collect();
    Json(sites)
}

/// GET /api/alerts
///
/// Channel wiring status, not alert history.
pub async fn alerts(State(state): State<AppState>) -> Json<AlertStatus> {
    let mut status = AlertStatus {
        email_enabled: false,
        webhook_enabled: false,
        total_channels: 0,
    };

    if let Some(alerts) = &state.config.alerts {
        status.email_enabled = alerts.email.enabled;
        status.webhook_enabled = alerts.webhook.enabled;
        status.total_channels =
            usize::from(status.email_enabled) + usize::from(status.webhook_enabled);
    }

    Json(status)
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    format: Option<String>,
    site: Option<String>,
    since: Option<String>,
    until: Option<String>,
    limit: Option<usize>,
    stats: Option<String>,
    download: Option<String>,
}

/// GET /api/export
pub async fn export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    let format = ExportFormat::parse(query.format.as_deref().unwrap_or("json"))
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let mut opts = ExportOptions::new(format);
    if let Some(site) = query.site {
        opts.site_name = site;
    }
    if let Some(raw) = query.since.as_deref() {
        match parse_duration(raw) {
            Ok(d) => opts.since = d,
            Err(e) => warn!("ignoring unparseable since parameter '{raw}': {e}"),
        }
    }
    if let Some(raw) = query.until.as_deref() {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => opts.until = Some(ts.with_timezone(&Utc)),
            Err(e) => warn!("ignoring unparseable until parameter '{raw}': {e}"),
        }
    }
    if let Some(limit) = query.limit {
        opts.limit = limit;
    }
    opts.include_stats = query.stats.as_deref() == Some("true");

    let exporter = Exporter::new(state.store.clone());
    let data = exporter.export(&opts).await?;

    let formatter = formatter_for(format);
    let body = formatter.format(&data)?;

    let mut builder = Response::builder().header(header::CONTENT_TYPE, formatter.content_type());

    if query.download.as_deref() == Some("true") {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let filename = if opts.site_name.is_empty() {
            format!("sitewatch_export_{timestamp}{}", formatter.file_extension())
        } else {
            format!(
                "sitewatch_{}_{timestamp}{}",
                opts.site_name.replace(' ', "_"),
                formatter.file_extension()
            )
        };
        builder = builder.header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        );
    }

    builder
        .body(Body::from(body))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_defaults_to_24h() {
        let resolved = resolve_since(None);
        let expected = Utc::now() - chrono::Duration::hours(24);
        assert!((resolved - expected).num_seconds().abs() < 2);
    }

    #[test]
    fn since_parses_valid_durations() {
        let resolved = resolve_since(Some("1h"));
        let expected = Utc::now() - chrono::Duration::hours(1);
        assert!((resolved - expected).num_seconds().abs() < 2);
    }

    #[test]
    fn bad_since_falls_back_to_default() {
        let resolved = resolve_since(Some("not-a-duration"));
        let expected = Utc::now() - chrono::Duration::hours(24);
        assert!((resolved - expected).num_seconds().abs() < 2);
    }
}
