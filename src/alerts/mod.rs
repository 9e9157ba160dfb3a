//! Alert detection and delivery.
//!
//! The engine watches the probe result stream and drives a per-site
//! state machine (down detection with a consecutive-failure threshold,
//! recovery, slow responses, low windowed uptime). Emitted alerts fan
//! out to every configured channel.

pub mod email;
pub mod engine;
pub mod types;
pub mod webhook;

use std::sync::Arc;

pub use email::EmailChannel;
pub use engine::AlertEngine;
pub use types::{Alert, AlertChannel, AlertKind, AlertState, ChannelError, Severity};
pub use webhook::WebhookChannel;

use crate::config::AlertConfig;
use crate::storage::Store;

/// Build an engine from the alert section of the configuration,
/// wiring up whichever channels are enabled.
pub fn engine_from_config(
    config: &AlertConfig,
    store: Arc<dyn Store>,
) -> anyhow::Result<AlertEngine> {
    let thresholds = config.thresholds.resolve()?;
    let mut engine = AlertEngine::new(thresholds, store);

    if config.email.enabled {
        let channel = EmailChannel::new(config.email.clone())
            .map_err(|e| anyhow::anyhow!("email channel: {e}"))?;
        engine.add_channel(Box::new(channel));
    }

    if config.webhook.enabled {
        engine.add_channel(Box::new(WebhookChannel::new(config.webhook.clone())));
    }

    Ok(engine)
}
