use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duration::format_duration;

/// The outcome of a single probe. Immutable once created.
///
/// A probe is successful when the transport completed and the response
/// code is in `[200, 400)`. On transport failure `status` is 0 and
/// `error` carries the client error text; on HTTP failure `status` is
/// the response code and `error` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub site_name: String,
    pub url: String,
    pub status: u16,
    #[serde(with = "crate::duration::serde_ns")]
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ProbeResult {
    /// Success rule shared by the prober and tests.
    pub fn is_success_code(status: u16) -> bool {
        (200..400).contains(&status)
    }
}

impl std::fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let marker = if self.success { "OK" } else { "FAIL" };
        write!(
            f,
            "[{}] {} ({}) status={} took {}",
            self.timestamp.format("%H:%M:%S"),
            marker,
            self.site_name,
            self.status,
            format_duration(self.duration),
        )?;
        if !self.error.is_empty() {
            write!(f, " error={}", self.error)?;
        }
        Ok(())
    }
}
