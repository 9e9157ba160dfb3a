//! Periodic email reports.
//!
//! A scheduler task ticks hourly and checks which configured report
//! schedules have come due. A due report computes windowed stats and
//! advanced metrics for its sites, renders an HTML summary, and sends
//! it through the email channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, instrument, warn};

use crate::alerts::EmailChannel;
use crate::config::{EmailConfig, SiteConfig};
use crate::duration::format_duration;
use crate::metrics::{MetricsCalculator, SiteMetrics};
use crate::storage::{Stats, Store};

const REPORT_TICK: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Daily,
    Weekly,
}

impl Cadence {
    /// Both the send interval and the report's lookback window.
    pub fn window(&self) -> Duration {
        match self {
            Cadence::Daily => Duration::from_secs(24 * 3600),
            Cadence::Weekly => Duration::from_secs(7 * 24 * 3600),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportSchedule {
    pub name: String,
    /// Site names in scope; empty means every configured site.
    pub sites: Vec<String>,
    pub recipients: Vec<String>,
    pub cadence: Cadence,
    pub enabled: bool,
    pub last_sent: Option<DateTime<Utc>>,
}

impl ReportSchedule {
    pub fn due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last_sent {
            None => true,
            Some(last) => now
                .signed_duration_since(last)
                .to_std()
                .map(|elapsed| elapsed >= self.cadence.window())
                .unwrap_or(false),
        }
    }
}

pub struct ReportScheduler {
    store: Arc<dyn Store>,
    calculator: MetricsCalculator,
    email: EmailChannel,
    /// Site configurations, so reports know each site's URL.
    sites: Vec<SiteConfig>,
    schedules: Mutex<Vec<ReportSchedule>>,
}

impl ReportScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        email_config: EmailConfig,
        sites: Vec<SiteConfig>,
    ) -> anyhow::Result<Self> {
        let email = EmailChannel::new(email_config)
            .map_err(|e| anyhow::anyhow!("report email channel: {e}"))?;

        Ok(Self {
            calculator: MetricsCalculator::new(store.clone()),
            store,
            email,
            sites,
            schedules: Mutex::new(Vec::new()),
        })
    }

    pub async fn add_schedule(&self, schedule: ReportSchedule) {
        info!(
            "report schedule '{}' registered ({})",
            schedule.name,
            schedule.cadence.label()
        );
        self.schedules.lock().await.push(schedule);
    }

    /// Tick hourly until the stop signal; send whatever has come due.
    #[instrument(skip_all)]
    pub async fn run(self: Arc<Self>, mut stop: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(REPORT_TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop.recv() => break,
                _ = ticker.tick() => self.send_due_reports(Utc::now()).await,
            }
        }
    }

    async fn send_due_reports(&self, now: DateTime<Utc>) {
        let mut schedules = self.schedules.lock().await;
        for schedule in schedules.iter_mut() {
            if !schedule.due(now) {
                continue;
            }

            match self.generate_and_send(schedule, now).await {
                Ok(()) => {
                    schedule.last_sent = Some(now);
                    info!("report '{}' sent", schedule.name);
                }
                Err(e) => error!("report '{}' failed: {e}", schedule.name),
            }
        }
    }

    pub async fn generate_and_send(
        &self,
        schedule: &ReportSchedule,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let html = self.generate(schedule, now).await?;
        let subject = format!(
            "sitewatch {} report: {}",
            schedule.cadence.label(),
            schedule.name
        );
        self.email
            .send_html(&subject, &html, &schedule.recipients)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        Ok(())
    }

    /// Render the report body: an overview line plus one section per
    /// site with stats and advanced metrics.
    pub async fn generate(
        &self,
        schedule: &ReportSchedule,
        now: DateTime<Utc>,
    ) -> anyhow::Result<String> {
        let window = schedule.cadence.window();
        let since = now
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::hours(24));

        let in_scope: Vec<&SiteConfig> = self
            .sites
            .iter()
            .filter(|site| schedule.sites.is_empty() || schedule.sites.contains(&site.name))
            .collect();

        let mut sections = String::new();
        let mut total_checks = 0i64;
        let mut successful_checks = 0i64;

        for site in &in_scope {
            let stats = self.store.stats(&site.name, since).await?;
            total_checks += stats.total_checks;
            successful_checks += stats.successful_checks;

            let metrics = match self
                .calculator
                .calculate(&site.name, since, schedule.cadence.label())
                .await
            {
                Ok(m) => Some(m),
                Err(e) => {
                    warn!("no metrics for {} in report: {e}", site.name);
                    None
                }
            };

            sections.push_str(&site_section(site, &stats, metrics.as_ref()));
        }

        let overall = if total_checks > 0 {
            successful_checks as f64 / total_checks as f64 * 100.0
        } else {
            0.0
        };

        Ok(format!(
            r#"<html><body style="font-family:sans-serif;color:#222">
<h1>{name}</h1>
<p>Period: {label} ending {end}. {sites} sites, {checks} checks, {overall:.2}% overall uptime.</p>
{sections}
<p style="color:#999;font-size:12px">Sent by sitewatch</p>
</body></html>"#,
            name = schedule.name,
            label = schedule.cadence.label(),
            end = now.format("%Y-%m-%d %H:%M UTC"),
            sites = in_scope.len(),
            checks = total_checks,
        ))
    }
}

fn site_section(site: &SiteConfig, stats: &Stats, metrics: Option<&SiteMetrics>) -> String {
    let mut rows = format!(
        "<tr><td>Checks</td><td>{}</td></tr>\
         <tr><td>Uptime</td><td>{:.2}%</td></tr>\
         <tr><td>Avg response</td><td>{}</td></tr>",
        stats.total_checks,
        stats.success_rate,
        format_duration(stats.avg_response_time),
    );

    if let Some(m) = metrics {
        rows.push_str(&format!(
            "<tr><td>P95 / P99</td><td>{} / {}</td></tr>\
             <tr><td>MTTR / MTBF</td><td>{} / {}</td></tr>\
             <tr><td>Nines</td><td>{}</td></tr>\
             <tr><td>Trends</td><td>response {} / uptime {}</td></tr>",
            format_duration(m.p95_response_time),
            format_duration(m.p99_response_time),
            format_duration(m.mttr),
            format_duration(m.mtbf),
            m.availability_nines,
            m.response_time_trend,
            m.uptime_trend,
        ));
    }

    format!(
        "<h2>{name}</h2><p><a href=\"{url}\">{url}</a></p><table>{rows}</table>",
        name = site.name,
        url = site.url,
    )
}
