//! Per-site probe loop.
//!
//! Each prober owns one HTTP client configured with the site's timeout
//! and fires a GET at every period tick. The first probe runs
//! immediately; when a probe outlasts its period, the missed tick is
//! skipped instead of accumulating lag. Every outcome is logged,
//! persisted, and handed to the alert engine, in that order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::alerts::AlertEngine;
use crate::config::SiteConfig;
use crate::storage::Store;

use super::result::ProbeResult;

pub struct Prober {
    name: String,
    url: String,
    period: Duration,
    client: reqwest::Client,
    store: Arc<dyn Store>,
    engine: Option<Arc<AlertEngine>>,
}

impl Prober {
    pub fn new(
        site: &SiteConfig,
        store: Arc<dyn Store>,
        engine: Option<Arc<AlertEngine>>,
    ) -> anyhow::Result<Self> {
        let period = site.interval()?;
        let timeout = site.timeout()?;

        Ok(Self {
            name: site.name.clone(),
            url: site.url.clone(),
            period,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?,
            store,
            engine,
        })
    }

    /// Run until the stop signal arrives. An in-flight request is
    /// cancelled by the stop signal rather than awaited.
    #[instrument(skip_all, fields(site = %self.name))]
    pub async fn run(self, mut stop: broadcast::Receiver<()>) {
        debug!("prober started, period {:?}", self.period);

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop.recv() => {
                    debug!("stop signal received");
                    break;
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = stop.recv() => {
                            debug!("stop signal received mid-probe");
                            break;
                        }
                        result = self.probe_once() => {
                            self.record(result).await;
                        }
                    }
                }
            }
        }

        debug!("prober stopped");
    }

    /// One GET against the site. Never fails; every outcome becomes a
    /// result record.
    pub async fn probe_once(&self) -> ProbeResult {
        // Millisecond precision so the persisted row compares equal
        // after a round-trip through the store.
        let timestamp = truncate_to_millis(Utc::now());
        let start = Instant::now();

        match self.client.get(&self.url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                // Dropping the response closes the body unread.
                drop(response);
                let duration = start.elapsed();

                ProbeResult {
                    site_name: self.name.clone(),
                    url: self.url.clone(),
                    status,
                    duration,
                    timestamp,
                    success: ProbeResult::is_success_code(status),
                    error: String::new(),
                }
            }
            Err(e) => ProbeResult {
                site_name: self.name.clone(),
                url: self.url.clone(),
                status: 0,
                duration: start.elapsed(),
                timestamp,
                success: false,
                error: e.to_string(),
            },
        }
    }

    /// Log, persist, and evaluate one result. Persistence failure is
    /// logged and swallowed; the loop must keep running.
    async fn record(&self, result: ProbeResult) {
        info!("{result}");

        if let Err(e) = self.store.save_result(&result).await {
            warn!("failed to save result for {}: {e}", self.name);
        }

        if let Some(engine) = &self.engine {
            engine.process_result(&result).await;
        }
    }
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}
