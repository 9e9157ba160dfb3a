use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    SiteDown,
    SiteUp,
    SlowResponse,
    LowUptime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A monitoring alert. Immutable once created; channels only read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub site_name: String,
    pub site_url: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
    pub timestamp: DateTime<Utc>,

    // Context, filled in where it applies.
    #[serde(default, skip_serializing_if = "is_zero_status")]
    pub status: u16,
    #[serde(
        with = "crate::duration::serde_ns_opt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub response_time: Option<Duration>,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub consecutive_fails: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

fn is_zero_status(status: &u16) -> bool {
    *status == 0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

impl Alert {
    /// Synthetic alert used by channel `test()` implementations.
    pub fn synthetic() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: AlertKind::SiteDown,
            severity: Severity::Info,
            site_name: "Test Site".to_string(),
            site_url: "https://example.com".to_string(),
            message: "This is a test alert".to_string(),
            details: "Verifying alert channel configuration".to_string(),
            timestamp: Utc::now(),
            status: 0,
            response_time: None,
            consecutive_fails: 0,
            uptime_percent: None,
            error_message: String::new(),
        }
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            AlertKind::SiteDown => write!(f, "SITE DOWN: {} is not responding", self.site_name),
            AlertKind::SiteUp => write!(f, "SITE RECOVERED: {} is back online", self.site_name),
            AlertKind::SlowResponse => write!(
                f,
                "SLOW RESPONSE: {} is responding slowly ({})",
                self.site_name,
                self.response_time
                    .map(crate::duration::format_duration)
                    .unwrap_or_else(|| "?".to_string()),
            ),
            AlertKind::LowUptime => write!(
                f,
                "LOW UPTIME: {} uptime is {:.1}%",
                self.site_name,
                self.uptime_percent.unwrap_or(0.0),
            ),
        }
    }
}

/// Per-site alert state. Created lazily on a site's first probe and
/// kept for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertState {
    pub site_name: String,
    pub is_down: bool,
    pub consecutive_fails: u32,
    pub last_fail_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_alert_at: Option<DateTime<Utc>>,
    /// Limits the low-uptime stats query to once per check interval.
    pub last_uptime_check_at: Option<DateTime<Utc>>,
    /// Ids of unresolved site-down alerts; empty whenever `is_down` is
    /// false.
    pub active_alerts: Vec<String>,
}

impl AlertState {
    pub fn new(site_name: &str) -> Self {
        Self {
            site_name: site_name.to_string(),
            is_down: false,
            consecutive_fails: 0,
            last_fail_at: None,
            last_success_at: None,
            last_alert_at: None,
            last_uptime_check_at: None,
            active_alerts: Vec::new(),
        }
    }
}

/// Errors produced by alert channels.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel is disabled")]
    Disabled,

    #[error("invalid channel configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build email: {0}")]
    Email(#[from] lettre::error::Error),
}

/// A delivery target for alerts.
///
/// Channel failures are isolated: the engine tries every channel and
/// aggregates errors, and a failed dispatch never rolls back alert
/// state.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), ChannelError>;

    /// Deliver a synthetic alert to verify the configuration.
    async fn test(&self) -> Result<(), ChannelError>;

    /// Channel name for logging.
    fn name(&self) -> String;
}
