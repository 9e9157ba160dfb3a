//! Webhook alert channel.
//!
//! Posts alerts as JSON to a configured URL. The payload shape follows
//! the configured format: Slack attachments, Discord embeds, Microsoft
//! Teams MessageCard, or a generic envelope. Failed deliveries are
//! retried with a quadratic backoff.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::config::WebhookConfig;
use crate::duration::{format_duration, parse_duration};

use super::types::{Alert, AlertChannel, ChannelError, Severity};

const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

pub struct WebhookChannel {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Self {
        let timeout = if config.timeout.is_empty() {
            DEFAULT_TIMEOUT
        } else {
            parse_duration(&config.timeout).unwrap_or(DEFAULT_TIMEOUT)
        };

        Self {
            config,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    fn payload(&self, alert: &Alert) -> Value {
        match self.config.format.as_str() {
            "slack" => self.slack_payload(alert),
            "discord" => self.discord_payload(alert),
            "teams" => self.teams_payload(alert),
            _ => self.generic_payload(alert),
        }
    }

    fn slack_payload(&self, alert: &Alert) -> Value {
        let color = match alert.severity {
            Severity::Critical => "danger",
            Severity::Warning => "warning",
            Severity::Info => "good",
        };

        let mut fields = vec![
            json!({"title": "Site", "value": alert.site_name, "short": true}),
            json!({"title": "Severity", "value": alert.severity.to_string(), "short": true}),
        ];
        if alert.status > 0 {
            fields.push(json!({"title": "HTTP Status", "value": alert.status.to_string(), "short": true}));
        }
        if let Some(rt) = alert.response_time {
            fields.push(json!({"title": "Response Time", "value": format_duration(rt), "short": true}));
        }
        if alert.consecutive_fails > 0 {
            fields.push(json!({"title": "Consecutive Failures", "value": alert.consecutive_fails.to_string(), "short": true}));
        }
        if let Some(uptime) = alert.uptime_percent {
            fields.push(json!({"title": "Uptime", "value": format!("{uptime:.1}%"), "short": true}));
        }

        json!({
            "text": alert.to_string(),
            "attachments": [{
                "color": color,
                "title": alert.message,
                "text": alert.details,
                "fields": fields,
                "footer": "sitewatch",
                "ts": alert.timestamp.timestamp(),
            }]
        })
    }

    fn discord_payload(&self, alert: &Alert) -> Value {
        let color = match alert.severity {
            Severity::Critical => 15_158_332, // Red
            Severity::Warning => 15_105_570,  // Orange
            Severity::Info => 3_447_003,      // Blue
        };

        let mut fields = vec![
            json!({"name": "Site", "value": alert.site_name, "inline": true}),
            json!({"name": "Severity", "value": alert.severity.to_string(), "inline": true}),
        ];
        if alert.status > 0 {
            fields.push(json!({"name": "HTTP Status", "value": alert.status.to_string(), "inline": true}));
        }
        if let Some(rt) = alert.response_time {
            fields.push(json!({"name": "Response Time", "value": format_duration(rt), "inline": true}));
        }

        json!({
            "content": alert.to_string(),
            "embeds": [{
                "title": alert.message,
                "description": alert.details,
                "color": color,
                "fields": fields,
                "footer": {"text": "sitewatch"},
                "timestamp": alert.timestamp.to_rfc3339(),
            }]
        })
    }

    fn teams_payload(&self, alert: &Alert) -> Value {
        let theme_color = match alert.severity {
            Severity::Critical => "D13438",
            Severity::Warning => "FF8C00",
            Severity::Info => "0078D4",
        };

        let mut facts = vec![
            json!({"name": "Site", "value": alert.site_name}),
            json!({"name": "URL", "value": alert.site_url}),
            json!({"name": "Severity", "value": alert.severity.to_string()}),
        ];
        if alert.status > 0 {
            facts.push(json!({"name": "HTTP Status", "value": alert.status.to_string()}));
        }
        if let Some(rt) = alert.response_time {
            facts.push(json!({"name": "Response Time", "value": format_duration(rt)}));
        }

        json!({
            "@type": "MessageCard",
            "@context": "https://schema.org/extensions",
            "summary": alert.message,
            "themeColor": theme_color,
            "sections": [{
                "activityTitle": alert.message,
                "activitySubtitle": format!("Site: {}", alert.site_name),
                "text": alert.details,
                "facts": facts,
            }],
            "potentialAction": [{
                "@type": "OpenUri",
                "name": "View Site",
                "targets": [{"os": "default", "uri": alert.site_url}],
            }]
        })
    }

    fn generic_payload(&self, alert: &Alert) -> Value {
        json!({
            "alert": alert,
            "message": alert.to_string(),
            "timestamp": alert.timestamp.to_rfc3339(),
        })
    }

    async fn post(&self, payload: &Value) -> Result<(), ChannelError> {
        let mut request = self
            .client
            .post(&self.config.url)
            .header("User-Agent", "sitewatch/0.7")
            .json(payload);
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("webhook delivered ({status})");
        Ok(())
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    #[instrument(skip(self, alert), fields(kind = ?alert.kind))]
    async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        let payload = self.payload(alert);

        let max_attempts = self.config.retry_count.max(1);
        let mut last_error = None;
        for attempt in 1..=max_attempts {
            match self.post(&payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("webhook attempt {attempt}/{max_attempts} failed: {e}");
                    last_error = Some(e);
                    if attempt < max_attempts {
                        let backoff =
                            std::time::Duration::from_secs((attempt * attempt) as u64);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(ChannelError::Disabled))
    }

    async fn test(&self) -> Result<(), ChannelError> {
        if !self.config.enabled {
            return Err(ChannelError::Disabled);
        }
        if self.config.url.is_empty() {
            return Err(ChannelError::InvalidConfig(
                "webhook URL not configured".to_string(),
            ));
        }

        self.send(&Alert::synthetic()).await
    }

    fn name(&self) -> String {
        format!("Webhook ({})", self.config.format)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::alerts::types::AlertKind;

    fn channel(format: &str) -> WebhookChannel {
        WebhookChannel::new(WebhookConfig {
            enabled: true,
            url: "https://hooks.example.com/x".to_string(),
            format: format.to_string(),
            ..Default::default()
        })
    }

    fn down_alert() -> Alert {
        let mut alert = Alert::synthetic();
        alert.kind = AlertKind::SiteDown;
        alert.severity = Severity::Critical;
        alert.status = 503;
        alert.consecutive_fails = 3;
        alert
    }

    #[test]
    fn slack_payload_shape() {
        let payload = channel("slack").payload(&down_alert());

        assert!(payload["text"].as_str().unwrap().contains("SITE DOWN"));
        let attachment = &payload["attachments"][0];
        assert_eq!(attachment["color"], "danger");
        assert_eq!(attachment["footer"], "sitewatch");
        let fields = attachment["fields"].as_array().unwrap();
        assert!(fields.iter().any(|f| f["title"] == "HTTP Status" && f["value"] == "503"));
        assert!(fields
            .iter()
            .any(|f| f["title"] == "Consecutive Failures" && f["value"] == "3"));
    }

    #[test]
    fn discord_payload_shape() {
        let payload = channel("discord").payload(&down_alert());

        let embed = &payload["embeds"][0];
        assert_eq!(embed["color"], 15_158_332);
        assert_eq!(embed["footer"]["text"], "sitewatch");
        assert!(embed["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn teams_payload_shape() {
        let payload = channel("teams").payload(&down_alert());

        assert_eq!(payload["@type"], "MessageCard");
        assert_eq!(payload["@context"], "https://schema.org/extensions");
        assert_eq!(payload["themeColor"], "D13438");
        let facts = payload["sections"][0]["facts"].as_array().unwrap();
        assert!(facts.iter().any(|f| f["name"] == "Site"));
        assert_eq!(payload["potentialAction"][0]["@type"], "OpenUri");
    }

    #[test]
    fn generic_payload_embeds_full_alert() {
        let mut alert = down_alert();
        alert.response_time = Some(Duration::from_millis(1_500));
        let payload = channel("").payload(&alert);

        assert_eq!(payload["alert"]["kind"], "site_down");
        assert_eq!(payload["alert"]["severity"], "critical");
        // Durations cross the wire as integer nanoseconds.
        assert_eq!(payload["alert"]["response_time"], 1_500_000_000u64);
        assert!(payload["message"].as_str().unwrap().contains("SITE DOWN"));
    }

    #[test]
    fn warning_severity_maps_to_vendor_colors() {
        let mut alert = down_alert();
        alert.severity = Severity::Warning;

        assert_eq!(channel("slack").payload(&alert)["attachments"][0]["color"], "warning");
        assert_eq!(channel("discord").payload(&alert)["embeds"][0]["color"], 15_105_570);
        assert_eq!(channel("teams").payload(&alert)["themeColor"], "FF8C00");
    }
}
