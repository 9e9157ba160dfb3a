//! Command implementations behind the CLI surface.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::alerts;
use crate::config::load_config;
use crate::duration::{format_duration, parse_duration};
use crate::export::{formatter_for, ExportFormat, ExportOptions, Exporter};
use crate::monitor::Scheduler;
use crate::reports::{Cadence, ReportSchedule, ReportScheduler};
use crate::storage::{SqliteStore, Store};
use crate::web::{self, status_label, AppState};

pub async fn open_store(db_path: &str) -> anyhow::Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(db_path).await?;
    store.init().await?;
    Ok(Arc::new(store))
}

fn since_from(raw: &str) -> anyhow::Result<chrono::DateTime<Utc>> {
    let window = parse_duration(raw).map_err(|e| anyhow::anyhow!("invalid duration '{raw}': {e}"))?;
    Ok(Utc::now() - chrono::Duration::from_std(window)?)
}

/// `run`: probe every configured site until terminated.
pub async fn run_monitor(config_path: &str, db_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(db_path).await?;

    info!("starting monitoring for {} sites", config.sites.len());
    info!("database initialized: {db_path}");

    let engine = match &config.alerts {
        Some(alert_config) => {
            let engine = alerts::engine_from_config(alert_config, store.clone())?;
            info!("alerting enabled with {} channels", engine.channel_count());
            Some(Arc::new(engine))
        }
        None => None,
    };

    let mut scheduler = Scheduler::new();
    scheduler.start(&config.sites, store.clone(), engine)?;

    // Optional periodic email reports.
    let (report_stop_tx, _) = broadcast::channel(1);
    if let Some(alert_config) = &config.alerts {
        if alert_config.email.enabled {
            let reports = Arc::new(ReportScheduler::new(
                store.clone() as Arc<dyn Store>,
                alert_config.email.clone(),
                config.sites.clone(),
            )?);
            reports
                .add_schedule(ReportSchedule {
                    name: "Daily summary".to_string(),
                    sites: Vec::new(),
                    recipients: alert_config.email.recipients.clone(),
                    cadence: Cadence::Daily,
                    enabled: true,
                    last_sent: Some(Utc::now()),
                })
                .await;
            tokio::spawn(reports.run(report_stop_tx.subscribe()));
            info!("report scheduler started");
        }
    }

    info!("monitoring active, press Ctrl+C to stop");
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => error!("unable to listen for shutdown signal: {e}"),
    }

    let _ = report_stop_tx.send(());
    scheduler.shutdown().await;
    store.close().await?;
    info!("shutdown complete");

    Ok(())
}

/// `stats`: print windowed statistics.
pub async fn show_stats(db_path: &str, site: Option<String>, since: &str) -> anyhow::Result<()> {
    let store = open_store(db_path).await?;
    let since_ts = since_from(since)?;

    match site {
        Some(site) => {
            let stats = store.stats(&site, since_ts).await?;
            println!("{stats}");
            println!(
                "  successes: {}, failures: {}, min: {}, max: {}",
                stats.successful_checks,
                stats.failed_checks,
                format_duration(stats.min_response_time),
                format_duration(stats.max_response_time),
            );
        }
        None => {
            let all = store.all_stats(since_ts).await?;
            if all.is_empty() {
                println!("no data in the last {since}");
            }
            let mut names: Vec<_> = all.keys().collect();
            names.sort();
            for name in names {
                println!("{}", all[name]);
            }
        }
    }

    store.close().await?;
    Ok(())
}

/// `history`: print windowed probe history, newest first.
pub async fn show_history(
    db_path: &str,
    site: Option<String>,
    since: &str,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let store = open_store(db_path).await?;
    let since_ts = since_from(since)?;

    let mut entries = match site {
        Some(site) => store.history(&site, since_ts).await?,
        None => store.all_history(since_ts).await?,
    };
    if let Some(limit) = limit {
        entries.truncate(limit);
    }

    if entries.is_empty() {
        println!("no history in the last {since}");
    }
    for entry in entries {
        let marker = if entry.success { "OK  " } else { "FAIL" };
        println!(
            "[{}] {marker} {} status={} took {} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.site_name,
            entry.status,
            format_duration(entry.duration),
            entry.error,
        );
    }

    store.close().await?;
    Ok(())
}

/// `status`: one-shot or refreshing site status dump.
pub async fn show_status(db_path: &str, watch: bool, interval: &str) -> anyhow::Result<()> {
    let store = open_store(db_path).await?;
    let refresh =
        parse_duration(interval).map_err(|e| anyhow::anyhow!("invalid interval: {e}"))?;

    loop {
        print_status(store.as_ref()).await?;

        if !watch {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(refresh) => {
                // Scroll separator between refreshes.
                println!();
            }
        }
    }

    store.close().await?;
    Ok(())
}

async fn print_status(store: &SqliteStore) -> anyhow::Result<()> {
    let now = Utc::now();
    let all = store.all_stats(now - chrono::Duration::hours(24)).await?;

    println!("Site status as of {}", now.format("%H:%M:%S"));
    if all.is_empty() {
        println!("  no sites observed in the last 24h");
        return Ok(());
    }

    let mut names: Vec<_> = all.keys().collect();
    names.sort();
    for name in names {
        let stats = &all[name];
        println!(
            "  {:<10} {:<24} {:>6.1}% uptime, {} avg, {} checks",
            status_label(stats, now),
            stats.site_name,
            stats.success_rate,
            format_duration(stats.avg_response_time),
            stats.total_checks,
        );
    }

    Ok(())
}

/// `dashboard`: serve the web dashboard and push channel.
pub async fn run_dashboard(config_path: &str, db_path: &str, port: u16) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(db_path).await?;

    let state = AppState::new(store, Arc::new(config));
    web::serve(state, port).await
}

pub struct ExportArgs {
    pub format: String,
    pub site: Option<String>,
    pub since: String,
    pub until: Option<String>,
    pub limit: Option<usize>,
    pub stats: bool,
    pub stdout: bool,
    pub output: Option<String>,
}

/// `export`: dump windowed data to a file or stdout.
pub async fn run_export(db_path: &str, args: ExportArgs) -> anyhow::Result<()> {
    let format = ExportFormat::parse(&args.format)?;
    let store = open_store(db_path).await?;

    let mut opts = ExportOptions::new(format);
    if let Some(site) = args.site {
        opts.site_name = site;
    }
    opts.since =
        parse_duration(&args.since).map_err(|e| anyhow::anyhow!("invalid duration: {e}"))?;
    if let Some(raw) = &args.until {
        let parsed = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| {
                chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
            })
            .map_err(|_| {
                anyhow::anyhow!(
                    "invalid until time '{raw}': use 'YYYY-MM-DD HH:MM:SS' or 'YYYY-MM-DD'"
                )
            })?;
        opts.until = Some(parsed.and_utc());
    }
    if let Some(limit) = args.limit {
        opts.limit = limit;
    }
    opts.include_stats = args.stats;

    let exporter = Exporter::new(store.clone() as Arc<dyn Store>);
    let data = exporter.export(&opts).await?;
    let formatter = formatter_for(format);
    let rendered = formatter.format(&data)?;

    if args.stdout {
        print!("{rendered}");
    } else {
        let path = args.output.unwrap_or_else(|| {
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
            match &data.metadata.sites_included[..] {
                [single] => format!(
                    "sitewatch_{}_{timestamp}{}",
                    single.replace(' ', "_"),
                    formatter.file_extension()
                ),
                _ => format!("sitewatch_export_{timestamp}{}", formatter.file_extension()),
            }
        });
        std::fs::write(&path, rendered)?;
        println!(
            "exported {} records to {path}",
            data.metadata.total_records
        );
    }

    store.close().await?;
    Ok(())
}

/// `export --list-formats`
pub fn list_export_formats() {
    println!("Available export formats:");
    for format in ExportFormat::all() {
        println!("  {:<6} {}", format.to_string(), format.description());
    }
}

