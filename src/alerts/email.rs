//! Email alert channel over async SMTP.

use async_trait::async_trait;
use lettre::message::{header, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};

use crate::config::EmailConfig;
use crate::duration::format_duration;

use super::types::{Alert, AlertChannel, ChannelError, Severity};

pub struct EmailChannel {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Result<Self, ChannelError> {
        if config.smtp_server.is_empty() {
            return Err(ChannelError::InvalidConfig(
                "smtp_server not configured".to_string(),
            ));
        }

        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server)
                .map_err(|e| ChannelError::Smtp(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_server)
        };
        builder = builder.port(config.smtp_port);

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    fn subject(alert: &Alert) -> String {
        let prefix = match alert.severity {
            Severity::Critical => "[CRITICAL]",
            Severity::Warning => "[WARNING]",
            Severity::Info => "[INFO]",
        };
        format!("{prefix} sitewatch: {}", alert.message)
    }

    fn html_body(alert: &Alert) -> String {
        let color = match alert.severity {
            Severity::Critical => "#d13438",
            Severity::Warning => "#ff8c00",
            Severity::Info => "#107c10",
        };

        let mut rows = vec![
            ("Site", alert.site_name.clone()),
            ("URL", alert.site_url.clone()),
            ("Severity", alert.severity.to_string()),
            ("Time", alert.timestamp.to_rfc3339()),
        ];
        if alert.status > 0 {
            rows.push(("HTTP Status", alert.status.to_string()));
        }
        if let Some(rt) = alert.response_time {
            rows.push(("Response Time", format_duration(rt)));
        }
        if alert.consecutive_fails > 0 {
            rows.push(("Consecutive Failures", alert.consecutive_fails.to_string()));
        }
        if let Some(uptime) = alert.uptime_percent {
            rows.push(("Uptime", format!("{uptime:.1}%")));
        }
        if !alert.error_message.is_empty() {
            rows.push(("Error", alert.error_message.clone()));
        }

        let table_rows: String = rows
            .iter()
            .map(|(name, value)| {
                format!(
                    "<tr><td style=\"padding:4px 12px 4px 0;color:#666\">{name}</td><td style=\"padding:4px 0\">{value}</td></tr>"
                )
            })
            .collect();

        format!(
            r#"<html><body style="font-family:sans-serif;color:#222">
<h2 style="color:{color}">{message}</h2>
<p>{details}</p>
<table style="border-collapse:collapse">{table_rows}</table>
<p style="color:#999;font-size:12px">Sent by sitewatch</p>
</body></html>"#,
            message = alert.message,
            details = alert.details,
        )
    }

    fn plain_body(alert: &Alert) -> String {
        format!(
            "{}\n\n{}\n\nSite: {}\nURL: {}\nSeverity: {}\nTime: {}\n",
            alert.message,
            alert.details,
            alert.site_name,
            alert.site_url,
            alert.severity,
            alert.timestamp.to_rfc3339(),
        )
    }

    /// Send an arbitrary HTML document, used by the report scheduler.
    pub async fn send_html(
        &self,
        subject: &str,
        html: &str,
        recipients: &[String],
    ) -> Result<(), ChannelError> {
        if recipients.is_empty() {
            return Err(ChannelError::InvalidConfig(
                "no recipients configured".to_string(),
            ));
        }

        for recipient in recipients {
            let message = Message::builder()
                .from(self.config.from.parse()?)
                .to(recipient.parse()?)
                .subject(subject)
                .singlepart(
                    SinglePart::builder()
                        .header(header::ContentType::TEXT_HTML)
                        .body(html.to_string()),
                )?;
            self.transport
                .send(message)
                .await
                .map_err(|e| ChannelError::Smtp(e.to_string()))?;
            debug!("report email sent to {recipient}");
        }

        Ok(())
    }

    fn build_message(&self, alert: &Alert, recipient: &str) -> Result<Message, ChannelError> {
        Ok(Message::builder()
            .from(self.config.from.parse()?)
            .to(recipient.parse()?)
            .subject(Self::subject(alert))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(Self::plain_body(alert)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(Self::html_body(alert)),
                    ),
            )?)
    }
}

#[async_trait]
impl AlertChannel for EmailChannel {
    #[instrument(skip(self, alert), fields(kind = ?alert.kind))]
    async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        if self.config.recipients.is_empty() {
            return Err(ChannelError::InvalidConfig(
                "no recipients configured".to_string(),
            ));
        }

        for recipient in &self.config.recipients {
            let message = self.build_message(alert, recipient)?;
            self.transport
                .send(message)
                .await
                .map_err(|e| ChannelError::Smtp(e.to_string()))?;
            debug!("alert email sent to {recipient}");
        }

        Ok(())
    }

    async fn test(&self) -> Result<(), ChannelError> {
        if !self.config.enabled {
            return Err(ChannelError::Disabled);
        }
        self.send(&Alert::synthetic()).await
    }

    fn name(&self) -> String {
        "Email".to_string()
    }
}
