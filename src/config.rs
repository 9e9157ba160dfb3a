use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::duration::parse_duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub sites: Vec<SiteConfig>,
    pub alerts: Option<AlertConfig>,
}

/// A single website to monitor. `interval` and `timeout` are duration
/// strings (`"30s"`, `"5m"`); they are validated once at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
    pub interval: String,
    pub timeout: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub use_tls: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    /// One of `slack`, `discord`, `teams`; anything else gets the
    /// generic envelope.
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub timeout: String,
    #[serde(default)]
    pub retry_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdConfig {
    /// Consecutive failed probes before a site counts as down.
    #[serde(default = "default_consecutive_failures")]
    pub consecutive_failures: u32,
    #[serde(default = "default_response_time_threshold")]
    pub response_time_threshold: String,
    /// Percent, 0-100.
    #[serde(default = "default_uptime_threshold")]
    pub uptime_threshold: f64,
    #[serde(default = "default_uptime_window")]
    pub uptime_window: String,
    #[serde(default = "default_performance_window")]
    pub performance_window: String,
    #[serde(default = "default_alert_cooldown")]
    pub alert_cooldown: String,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            consecutive_failures: default_consecutive_failures(),
            response_time_threshold: default_response_time_threshold(),
            uptime_threshold: default_uptime_threshold(),
            uptime_window: default_uptime_window(),
            performance_window: default_performance_window(),
            alert_cooldown: default_alert_cooldown(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_consecutive_failures() -> u32 {
    3
}

fn default_response_time_threshold() -> String {
    "5s".to_string()
}

fn default_uptime_threshold() -> f64 {
    95.0
}

fn default_uptime_window() -> String {
    "24h".to_string()
}

fn default_performance_window() -> String {
    "1h".to_string()
}

fn default_alert_cooldown() -> String {
    "5m".to_string()
}

/// Threshold configuration with every duration string parsed.
///
/// Built once at startup so that a bad duration aborts the process
/// instead of surfacing mid-run.
#[derive(Debug, Clone)]
pub struct Thresholds {
    pub consecutive_failures: u32,
    pub response_time_threshold: Duration,
    pub uptime_threshold: f64,
    pub uptime_window: Duration,
    pub performance_window: Duration,
    pub alert_cooldown: Duration,
}

impl ThresholdConfig {
    pub fn resolve(&self) -> anyhow::Result<Thresholds> {
        if !(0.0..=100.0).contains(&self.uptime_threshold) {
            anyhow::bail!(
                "uptime_threshold must be between 0 and 100, got {}",
                self.uptime_threshold
            );
        }

        Ok(Thresholds {
            consecutive_failures: self.consecutive_failures,
            response_time_threshold: parse_duration(&self.response_time_threshold)
                .map_err(|e| anyhow::anyhow!("invalid response_time_threshold: {e}"))?,
            uptime_threshold: self.uptime_threshold,
            uptime_window: parse_duration(&self.uptime_window)
                .map_err(|e| anyhow::anyhow!("invalid uptime_window: {e}"))?,
            performance_window: parse_duration(&self.performance_window)
                .map_err(|e| anyhow::anyhow!("invalid performance_window: {e}"))?,
            alert_cooldown: parse_duration(&self.alert_cooldown)
                .map_err(|e| anyhow::anyhow!("invalid alert_cooldown: {e}"))?,
        })
    }
}

impl SiteConfig {
    pub fn interval(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.interval)
            .map_err(|e| anyhow::anyhow!("invalid interval for site '{}': {e}", self.name))
    }

    pub fn timeout(&self) -> anyhow::Result<Duration> {
        parse_duration(&self.timeout)
            .map_err(|e| anyhow::anyhow!("invalid timeout for site '{}': {e}", self.name))
    }
}

impl Config {
    /// Check everything that would otherwise fail mid-run: duration
    /// strings, thresholds, duplicate site names.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for site in &self.sites {
            if site.name.is_empty() {
                anyhow::bail!("site with url '{}' has an empty name", site.url);
            }
            if site.url.is_empty() {
                anyhow::bail!("site '{}' has an empty url", site.name);
            }
            if !seen.insert(site.name.as_str()) {
                anyhow::bail!("duplicate site name '{}'", site.name);
            }
            site.interval()?;
            site.timeout()?;
        }

        if let Some(alerts) = &self.alerts {
            alerts.thresholds.resolve()?;
            if alerts.webhook.enabled && alerts.webhook.url.is_empty() {
                anyhow::bail!("webhook alerts enabled but no url configured");
            }
            if alerts.email.enabled && alerts.email.smtp_server.is_empty() {
                anyhow::bail!("email alerts enabled but no smtp_server configured");
            }
        }

        Ok(())
    }
}

pub fn load_config(path: &str) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file '{path}': {e}"))?;
    let config: Config = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("invalid configuration file '{path}': {e}"))?;
    config.validate()?;
    trace!("loaded config: {config:?}");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config(interval: &str, timeout: &str) -> Config {
        Config {
            sites: vec![SiteConfig {
                name: "Example".to_string(),
                url: "https://example.com".to_string(),
                interval: interval.to_string(),
                timeout: timeout.to_string(),
            }],
            alerts: None,
        }
    }

    #[test]
    fn parses_full_config() {
        let json = r#"{
            "sites": [
                {"name": "Example", "url": "https://example.com", "interval": "30s", "timeout": "10s"}
            ],
            "alerts": {
                "email": {"enabled": false},
                "webhook": {"enabled": true, "url": "https://hooks.example.com/x", "format": "slack"},
                "thresholds": {
                    "consecutive_failures": 3,
                    "response_time_threshold": "2s",
                    "uptime_threshold": 99.0,
                    "uptime_window": "1h",
                    "performance_window": "1h",
                    "alert_cooldown": "10m"
                }
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        config.validate().unwrap();

        let thresholds = config.alerts.unwrap().thresholds.resolve().unwrap();
        assert_eq!(thresholds.consecutive_failures, 3);
        assert_eq!(thresholds.response_time_threshold, Duration::from_secs(2));
        assert_eq!(thresholds.alert_cooldown, Duration::from_secs(600));
    }

    #[test]
    fn day_suffix_accepted_in_windows() {
        let thresholds = ThresholdConfig {
            uptime_window: "7d".to_string(),
            ..Default::default()
        };
        let resolved = thresholds.resolve().unwrap();
        assert_eq!(resolved.uptime_window, Duration::from_secs(7 * 86_400));
    }

    #[test]
    fn invalid_interval_fails_validation() {
        let config = minimal_config("soon", "10s");
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_threshold_duration_fails_validation() {
        let mut config = minimal_config("30s", "10s");
        config.alerts = Some(AlertConfig {
            email: EmailConfig::default(),
            webhook: WebhookConfig::default(),
            thresholds: ThresholdConfig {
                alert_cooldown: "sometime".to_string(),
                ..Default::default()
            },
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_site_names_rejected() {
        let mut config = minimal_config("30s", "10s");
        config.sites.push(config.sites[0].clone());
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_uptime_threshold_rejected() {
        let thresholds = ThresholdConfig {
            uptime_threshold: 150.0,
            ..Default::default()
        };
        assert!(thresholds.resolve().is_err());
    }
}
