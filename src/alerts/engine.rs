//! Alert evaluation engine.
//!
//! One state machine per site, driven synchronously from the probers:
//! every persisted result is evaluated under a single engine lock, and
//! any alerts it produces are handed to every configured channel after
//! the lock is released.
//!
//! ## State machine
//!
//! ```text
//! Healthy --(consecutive fails reach threshold)--> Down   [SiteDown, critical]
//! Down    --(successful probe)-------------------> Healthy [SiteUp, info]
//! ```
//!
//! A per-site cooldown suppresses emissions (all kinds) after any
//! alert. Recovery still flips the state while suppressed; only the
//! notification is dropped, so a later outage alerts again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::Thresholds;
use crate::duration::format_duration;
use crate::monitor::result::ProbeResult;
use crate::storage::Store;

use super::types::{Alert, AlertChannel, AlertKind, AlertState, Severity};

/// Low-uptime evaluation runs at most this often per site.
const UPTIME_CHECK_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Minimum window population before low uptime is judged.
const UPTIME_MIN_CHECKS: i64 = 10;

pub struct AlertEngine {
    thresholds: Thresholds,
    store: Arc<dyn Store>,
    channels: Vec<Box<dyn AlertChannel>>,
    states: RwLock<HashMap<String, AlertState>>,
}

impl AlertEngine {
    pub fn new(thresholds: Thresholds, store: Arc<dyn Store>) -> Self {
        Self {
            thresholds,
            store,
            channels: Vec::new(),
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_channel(&mut self, channel: Box<dyn AlertChannel>) {
        info!("registered alert channel: {}", channel.name());
        self.channels.push(channel);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Evaluate one probe result, mutate the site's state, and dispatch
    /// whatever alerts the transition produced. Returns the emitted
    /// alerts.
    ///
    /// The result's own timestamp is the evaluation clock, which keeps
    /// cooldown arithmetic deterministic; in production it trails wall
    /// clock by at most one probe round-trip.
    #[instrument(skip(self, result), fields(site = %result.site_name))]
    pub async fn process_result(&self, result: &ProbeResult) -> Vec<Alert> {
        let now = result.timestamp;

        let alerts = {
            let mut states = self.states.write().await;
            let state = states
                .entry(result.site_name.clone())
                .or_insert_with(|| AlertState::new(&result.site_name));

            let was_down = state.is_down;

            if result.success {
                state.consecutive_fails = 0;
                state.last_success_at = Some(now);
            } else {
                state.consecutive_fails += 1;
                state.last_fail_at = Some(now);
                if state.consecutive_fails >= self.thresholds.consecutive_failures {
                    state.is_down = true;
                }
            }

            let mut alerts = Vec::new();
            if !self.in_cooldown(state, now) {
                self.check_site_down(state, result, was_down, &mut alerts);
                self.check_site_up(state, result, &mut alerts);
                self.check_slow_response(state, result, &mut alerts);
                self.check_low_uptime(state, result, now, &mut alerts).await;
            } else {
                debug!("cooldown active, suppressing alert evaluation");
            }

            // Recovery clears the down state even when the cooldown
            // swallowed the SiteUp notification; otherwise the site
            // would stay wedged as down and the next outage could
            // never alert.
            if result.success && state.is_down {
                state.is_down = false;
                state.active_alerts.clear();
            }

            if !alerts.is_empty() {
                state.last_alert_at = Some(now);
            }

            alerts
        };

        for alert in &alerts {
            info!("alert: {alert}");
            for channel in &self.channels {
                if let Err(e) = channel.send(alert).await {
                    error!("channel {} failed to deliver alert: {e}", channel.name());
                }
            }
        }

        alerts
    }

    fn in_cooldown(&self, state: &AlertState, now: DateTime<Utc>) -> bool {
        match state.last_alert_at {
            Some(last) => now
                .signed_duration_since(last)
                .to_std()
                .map(|elapsed| elapsed < self.thresholds.alert_cooldown)
                .unwrap_or(false),
            None => false,
        }
    }

    fn check_site_down(
        &self,
        state: &mut AlertState,
        result: &ProbeResult,
        was_down: bool,
        alerts: &mut Vec<Alert>,
    ) {
        // Edge-triggered: fires on the probe whose increment reaches
        // exactly the threshold.
        if result.success
            || was_down
            || state.consecutive_fails != self.thresholds.consecutive_failures
        {
            return;
        }

        let alert = Alert {
            id: Uuid::new_v4().to_string(),
            kind: AlertKind::SiteDown,
            severity: Severity::Critical,
            site_name: result.site_name.clone(),
            site_url: result.url.clone(),
            message: format!("Site {} is down", result.site_name),
            details: format!(
                "Failed {} consecutive checks. Last error: {}",
                state.consecutive_fails, result.error
            ),
            timestamp: result.timestamp,
            status: result.status,
            response_time: None,
            consecutive_fails: state.consecutive_fails,
            uptime_percent: None,
            error_message: result.error.clone(),
        };
        state.active_alerts.push(alert.id.clone());
        alerts.push(alert);
    }

    fn check_site_up(&self, state: &mut AlertState, result: &ProbeResult, alerts: &mut Vec<Alert>) {
        if !(state.is_down && result.success && !state.active_alerts.is_empty()) {
            return;
        }

        alerts.push(Alert {
            id: Uuid::new_v4().to_string(),
            kind: AlertKind::SiteUp,
            severity: Severity::Info,
            site_name: result.site_name.clone(),
            site_url: result.url.clone(),
            message: format!("Site {} has recovered", result.site_name),
            details: format!(
                "Site is responding normally. Response time: {}",
                format_duration(result.duration)
            ),
            timestamp: result.timestamp,
            status: result.status,
            response_time: Some(result.duration),
            consecutive_fails: 0,
            uptime_percent: None,
            error_message: String::new(),
        });
    }

    fn check_slow_response(
        &self,
        _state: &mut AlertState,
        result: &ProbeResult,
        alerts: &mut Vec<Alert>,
    ) {
        // Never fires on a failed probe.
        if !result.success || result.duration <= self.thresholds.response_time_threshold {
            return;
        }

        alerts.push(Alert {
            id: Uuid::new_v4().to_string(),
            kind: AlertKind::SlowResponse,
            severity: Severity::Warning,
            site_name: result.site_name.clone(),
            site_url: result.url.clone(),
            message: format!("Site {} is responding slowly", result.site_name),
            details: format!(
                "Response time {} exceeds threshold of {}",
                format_duration(result.duration),
                format_duration(self.thresholds.response_time_threshold)
            ),
            timestamp: result.timestamp,
            status: result.status,
            response_time: Some(result.duration),
            consecutive_fails: 0,
            uptime_percent: None,
            error_message: String::new(),
        });
    }

    async fn check_low_uptime(
        &self,
        state: &mut AlertState,
        result: &ProbeResult,
        now: DateTime<Utc>,
        alerts: &mut Vec<Alert>,
    ) {
        let due = match state.last_uptime_check_at {
            Some(last) => now
                .signed_duration_since(last)
                .to_std()
                .map(|elapsed| elapsed >= UPTIME_CHECK_INTERVAL)
                .unwrap_or(true),
            None => true,
        };
        if !due {
            return;
        }
        state.last_uptime_check_at = Some(now);

        let window = self.thresholds.uptime_window;
        let since = now
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::hours(24));

        let stats = match self.store.stats(&result.site_name, since).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("low-uptime stats query failed: {e}");
                return;
            }
        };

        if stats.total_checks < UPTIME_MIN_CHECKS
            || stats.success_rate >= self.thresholds.uptime_threshold
        {
            return;
        }

        alerts.push(Alert {
            id: Uuid::new_v4().to_string(),
            kind: AlertKind::LowUptime,
            severity: Severity::Warning,
            site_name: result.site_name.clone(),
            site_url: result.url.clone(),
            message: format!("Site {} has low uptime", result.site_name),
            details: format!(
                "Uptime {:.1}% is below threshold of {:.1}% over the last {}",
                stats.success_rate,
                self.thresholds.uptime_threshold,
                format_duration(window)
            ),
            timestamp: result.timestamp,
            status: 0,
            response_time: None,
            consecutive_fails: 0,
            uptime_percent: Some(stats.success_rate),
            error_message: String::new(),
        });
    }

    /// Deep copy of every site's alert state.
    pub async fn alert_states(&self) -> HashMap<String, AlertState> {
        self.states.read().await.clone()
    }

    /// Run every channel's self test, aggregating failures.
    pub async fn test_channels(&self) -> anyhow::Result<()> {
        if self.channels.is_empty() {
            anyhow::bail!("no alert channels configured");
        }

        let mut failures = Vec::new();
        for channel in &self.channels {
            info!("testing {} channel", channel.name());
            if let Err(e) = channel.test().await {
                failures.push(format!("{}: {e}", channel.name()));
            }
        }

        if failures.is_empty() {
            info!("all {} alert channels tested successfully", self.channels.len());
            Ok(())
        } else {
            anyhow::bail!("some channels failed tests: {}", failures.join("; "))
        }
    }
}
