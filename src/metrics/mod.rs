//! Statistical and reliability metrics over the probe history.
//!
//! Everything here is a pure function of a windowed, newest-first slice
//! of history entries; the calculator only loads the window from the
//! store and stitches the pieces together.
//!
//! Covered: response-time percentiles and standard deviation,
//! availability nines, downtime events with MTTR/MTBF, response-time
//! and uptime trends, error classification, SLA compliance, and
//! hour-of-day / day-of-week patterns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Local, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::storage::{HistoryEntry, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Degrading,
    Unknown,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Stable => write!(f, "stable"),
            Trend::Degrading => write!(f, "degrading"),
            Trend::Unknown => write!(f, "unknown"),
        }
    }
}

/// Composite metrics bundle for one site over one window.
#[derive(Debug, Clone, Serialize)]
pub struct SiteMetrics {
    pub site_name: String,
    pub period: String,

    #[serde(with = "crate::duration::serde_ns")]
    pub p50_response_time: Duration,
    #[serde(with = "crate::duration::serde_ns")]
    pub p90_response_time: Duration,
    #[serde(with = "crate::duration::serde_ns")]
    pub p95_response_time: Duration,
    #[serde(with = "crate::duration::serde_ns")]
    pub p99_response_time: Duration,
    #[serde(with = "crate::duration::serde_ns")]
    pub p999_response_time: Duration,
    #[serde(with = "crate::duration::serde_ns")]
    pub response_time_std_dev: Duration,

    #[serde(with = "crate::duration::serde_ns")]
    pub mttr: Duration,
    #[serde(with = "crate::duration::serde_ns")]
    pub mtbf: Duration,

    pub uptime_percent: f64,
    pub downtime_percent: f64,
    pub availability_nines: u8,

    pub error_rate_percent: f64,
    pub error_breakdown: HashMap<String, ErrorStats>,

    pub response_time_trend: Trend,
    pub uptime_trend: Trend,

    pub sla_compliance: HashMap<String, SlaResult>,

    pub hourly_pattern: Vec<HourlyStats>,
    pub weekly_pattern: WeeklyPattern,

    pub total_checks: i64,
    pub successful_checks: i64,
    pub failed_checks: i64,
    pub first_check: DateTime<Utc>,
    pub last_check: DateTime<Utc>,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorStats {
    pub count: i64,
    pub percentage: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlaResult {
    pub target_percent: f64,
    pub actual_percent: f64,
    pub compliant: bool,
    #[serde(with = "crate::duration::serde_ns")]
    pub violation_duration: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourlyStats {
    pub hour: u32,
    #[serde(with = "crate::duration::serde_ns")]
    pub avg_response_time: Duration,
    pub success_rate: f64,
    pub check_count: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DayStats {
    #[serde(with = "crate::duration::serde_ns")]
    pub avg_response_time: Duration,
    pub success_rate: f64,
    pub check_count: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WeeklyPattern {
    pub monday: DayStats,
    pub tuesday: DayStats,
    pub wednesday: DayStats,
    pub thursday: DayStats,
    pub friday: DayStats,
    pub saturday: DayStats,
    pub sunday: DayStats,
    pub best_day: String,
    pub worst_day: String,
}

/// A contiguous run of failed probes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DowntimeEvent {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration: Duration,
}

const SLA_TARGETS: [(&str, f64); 5] = [
    ("99.9% (8.77h downtime/month)", 99.9),
    ("99.95% (4.38h downtime/month)", 99.95),
    ("99.99% (52.6min downtime/month)", 99.99),
    ("99.5% (3.65d downtime/month)", 99.5),
    ("95% (36.5h downtime/month)", 95.0),
];

pub struct MetricsCalculator {
    store: Arc<dyn Store>,
}

impl MetricsCalculator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Compute the full metrics bundle for a site over `[since, now]`.
    /// Errors when the window holds no data.
    #[instrument(skip(self))]
    pub async fn calculate(
        &self,
        site_name: &str,
        since: DateTime<Utc>,
        period: &str,
    ) -> anyhow::Result<SiteMetrics> {
        let history = self.store.history(site_name, since).await?;
        if history.is_empty() {
            anyhow::bail!(
                "no data available for site {site_name} since {}",
                since.format("%Y-%m-%d")
            );
        }

        Ok(compute_metrics(site_name, period, &history, Utc::now()))
    }
}

/// Assemble the bundle from a newest-first history slice. `now` closes
/// any ongoing downtime run and anchors the MTBF window.
pub fn compute_metrics(
    site_name: &str,
    period: &str,
    history: &[HistoryEntry],
    now: DateTime<Utc>,
) -> SiteMetrics {
    let total_checks = history.len() as i64;
    let successful_checks = history.iter().filter(|e| e.success).count() as i64;
    let failed_checks = total_checks - successful_checks;

    // Newest first: the last element is the earliest probe.
    let first_check = history[history.len() - 1].timestamp;
    let last_check = history[0].timestamp;

    let uptime_percent = if total_checks > 0 {
        successful_checks as f64 / total_checks as f64 * 100.0
    } else {
        0.0
    };
    let downtime_percent = 100.0 - uptime_percent;

    let mut durations: Vec<Duration> = history
        .iter()
        .filter(|e| e.success)
        .map(|e| e.duration)
        .collect();
    durations.sort();

    let events = downtime_events(history, now);
    let (mttr, mtbf) = if events.is_empty() {
        (Duration::ZERO, Duration::ZERO)
    } else {
        (
            mean_time_to_recovery(&events),
            mean_time_between_failures(
                &events,
                now.signed_duration_since(first_check)
                    .to_std()
                    .unwrap_or(Duration::ZERO),
            ),
        )
    };

    SiteMetrics {
        site_name: site_name.to_string(),
        period: period.to_string(),
        p50_response_time: percentile(&durations, 50.0),
        p90_response_time: percentile(&durations, 90.0),
        p95_response_time: percentile(&durations, 95.0),
        p99_response_time: percentile(&durations, 99.0),
        p999_response_time: percentile(&durations, 99.9),
        response_time_std_dev: std_deviation(&durations),
        mttr,
        mtbf,
        uptime_percent,
        downtime_percent,
        availability_nines: nines(uptime_percent),
        error_rate_percent: downtime_percent,
        error_breakdown: error_breakdown(history, failed_checks),
        response_time_trend: response_time_trend(history),
        uptime_trend: uptime_trend(history),
        sla_compliance: sla_compliance(uptime_percent),
        hourly_pattern: hourly_pattern(history),
        weekly_pattern: weekly_pattern(history),
        total_checks,
        successful_checks,
        failed_checks,
        first_check,
        last_check,
        analyzed_at: now,
    }
}

/// Linear-interpolated percentile over an ascending-sorted slice.
/// Zero when the slice is empty.
pub fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }

    let index = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        return sorted[lower];
    }

    let weight = index - lower as f64;
    let lower_ns = sorted[lower].as_nanos() as f64;
    let upper_ns = sorted[upper].as_nanos() as f64;

    Duration::from_nanos((lower_ns + weight * (upper_ns - lower_ns)) as u64)
}

/// Population standard deviation.
pub fn std_deviation(durations: &[Duration]) -> Duration {
    if durations.is_empty() {
        return Duration::ZERO;
    }

    let n = durations.len() as f64;
    let mean = durations.iter().map(|d| d.as_nanos() as f64).sum::<f64>() / n;
    let variance = durations
        .iter()
        .map(|d| (d.as_nanos() as f64 - mean).powi(2))
        .sum::<f64>()
        / n;

    Duration::from_nanos(variance.sqrt() as u64)
}

/// Integer availability grade: 99.999% and up earns 5 nines.
pub fn nines(uptime_percent: f64) -> u8 {
    if uptime_percent >= 99.999 {
        5
    } else if uptime_percent >= 99.99 {
        4
    } else if uptime_percent >= 99.9 {
        3
    } else if uptime_percent >= 99.0 {
        2
    } else if uptime_percent >= 90.0 {
        1
    } else {
        0
    }
}

/// Walk the window oldest-first, collecting contiguous failure runs.
///
/// A success closes the current run at the recovery timestamp; a run
/// still open at the end of the walk is closed at `now`.
pub fn downtime_events(history: &[HistoryEntry], now: DateTime<Utc>) -> Vec<DowntimeEvent> {
    let mut events = Vec::new();
    let mut current: Option<DowntimeEvent> = None;

    for entry in history.iter().rev() {
        if !entry.success {
            match current.as_mut() {
                None => {
                    current = Some(DowntimeEvent {
                        started_at: entry.timestamp,
                        ended_at: entry.timestamp,
                        duration: Duration::ZERO,
                    });
                }
                Some(event) => event.ended_at = entry.timestamp,
            }
        } else if let Some(mut event) = current.take() {
            event.ended_at = entry.timestamp;
            event.duration = entry
                .timestamp
                .signed_duration_since(event.started_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            events.push(event);
        }
    }

    if let Some(mut event) = current.take() {
        event.ended_at = now;
        event.duration = now
            .signed_duration_since(event.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        events.push(event);
    }

    events
}

pub fn mean_time_to_recovery(events: &[DowntimeEvent]) -> Duration {
    if events.is_empty() {
        return Duration::ZERO;
    }
    let total: Duration = events.iter().map(|e| e.duration).sum();
    total / events.len() as u32
}

pub fn mean_time_between_failures(events: &[DowntimeEvent], total_period: Duration) -> Duration {
    if events.len() <= 1 {
        return total_period;
    }
    total_period / events.len() as u32
}

fn mean_success_duration(entries: &[HistoryEntry]) -> Duration {
    let successes: Vec<_> = entries.iter().filter(|e| e.success).collect();
    if successes.is_empty() {
        return Duration::ZERO;
    }
    let total: Duration = successes.iter().map(|e| e.duration).sum();
    total / successes.len() as u32
}

fn success_rate(entries: &[HistoryEntry]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    let successes = entries.iter().filter(|e| e.success).count();
    successes as f64 / entries.len() as f64 * 100.0
}

/// Compare mean successful response time of the newer half against the
/// older half; more than a 10% swing either way counts as a trend.
pub fn response_time_trend(history: &[HistoryEntry]) -> Trend {
    if history.len() < 10 {
        return Trend::Unknown;
    }

    let mid = history.len() / 2;
    let recent = mean_success_duration(&history[..mid]);
    let older = mean_success_duration(&history[mid..]);

    if older.is_zero() {
        return Trend::Unknown;
    }

    let change = (recent.as_nanos() as f64 - older.as_nanos() as f64)
        / older.as_nanos() as f64
        * 100.0;

    if change > 10.0 {
        Trend::Degrading
    } else if change < -10.0 {
        Trend::Improving
    } else {
        Trend::Stable
    }
}

/// Compare success rates of the newest quarter against the oldest
/// quarter; a five-point swing counts as a trend.
pub fn uptime_trend(history: &[HistoryEntry]) -> Trend {
    if history.len() < 20 {
        return Trend::Unknown;
    }

    let quarter = history.len() / 4;
    let newest = success_rate(&history[..quarter]);
    let oldest = success_rate(&history[3 * quarter..4 * quarter]);

    let diff = newest - oldest;
    if diff > 5.0 {
        Trend::Improving
    } else if diff < -5.0 {
        Trend::Degrading
    } else {
        Trend::Stable
    }
}

/// Classify an error message against a fixed ordered pattern list.
/// The substring checks for 5xx/4xx are knowingly loose and match the
/// historical behavior.
pub fn classify_error(error_message: &str) -> &'static str {
    let msg = error_message.to_lowercase();

    if msg.contains("timeout") || msg.contains("deadline") {
        "Timeout"
    } else if msg.contains("connection") || msg.contains("network") {
        "Network"
    } else if msg.contains("dns") || msg.contains("resolve") {
        "DNS"
    } else if msg.contains("ssl") || msg.contains("tls") || msg.contains("certificate") {
        "SSL/TLS"
    } else if msg.contains("refused") {
        "Connection Refused"
    } else if msg.contains('5') && msg.contains('0') {
        "Server Error (5xx)"
    } else if msg.contains('4') && msg.contains('0') {
        "Client Error (4xx)"
    } else {
        "Other"
    }
}

/// Group failures by error message with counts, share of failures,
/// first/last occurrence, and classified pattern.
pub fn error_breakdown(
    history: &[HistoryEntry],
    total_failed: i64,
) -> HashMap<String, ErrorStats> {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    let mut first_seen: HashMap<&str, DateTime<Utc>> = HashMap::new();
    let mut last_seen: HashMap<&str, DateTime<Utc>> = HashMap::new();

    for entry in history {
        if entry.success {
            continue;
        }
        let msg = if entry.error.is_empty() {
            "Unknown Error"
        } else {
            entry.error.as_str()
        };

        *counts.entry(msg).or_default() += 1;
        // Newest-first walk: keep overwriting first_seen so it lands on
        // the oldest occurrence, set last_seen only once.
        first_seen.insert(msg, entry.timestamp);
        last_seen.entry(msg).or_insert(entry.timestamp);
    }

    counts
        .into_iter()
        .map(|(msg, count)| {
            (
                msg.to_string(),
                ErrorStats {
                    count,
                    percentage: if total_failed > 0 {
                        count as f64 / total_failed as f64 * 100.0
                    } else {
                        0.0
                    },
                    first_seen: first_seen[msg],
                    last_seen: last_seen[msg],
                    pattern: classify_error(msg).to_string(),
                },
            )
        })
        .collect()
}

/// Compliance against the fixed SLA target set; non-compliance gets a
/// nominal violation duration over a 30-day month.
pub fn sla_compliance(actual_uptime: f64) -> HashMap<String, SlaResult> {
    SLA_TARGETS
        .iter()
        .map(|&(name, target)| {
            let violation = if actual_uptime < target {
                Duration::from_secs(30 * 24 * 3600).mul_f64((target - actual_uptime) / 100.0)
            } else {
                Duration::ZERO
            };
            (
                name.to_string(),
                SlaResult {
                    target_percent: target,
                    actual_percent: actual_uptime,
                    compliant: actual_uptime >= target,
                    violation_duration: violation,
                },
            )
        })
        .collect()
}

/// Bucket by local-time hour of day; empty hours are omitted.
pub fn hourly_pattern(history: &[HistoryEntry]) -> Vec<HourlyStats> {
    let mut buckets: HashMap<u32, Vec<&HistoryEntry>> = HashMap::new();
    for entry in history {
        let hour = entry.timestamp.with_timezone(&Local).hour();
        buckets.entry(hour).or_default().push(entry);
    }

    let mut stats: Vec<HourlyStats> = (0..24)
        .filter_map(|hour| {
            let entries = buckets.get(&hour)?;
            let successes: Vec<_> = entries.iter().filter(|e| e.success).collect();
            let avg = if successes.is_empty() {
                Duration::ZERO
            } else {
                let total: Duration = successes.iter().map(|e| e.duration).sum();
                total / successes.len() as u32
            };
            Some(HourlyStats {
                hour,
                avg_response_time: avg,
                success_rate: successes.len() as f64 / entries.len() as f64 * 100.0,
                check_count: entries.len() as i64,
            })
        })
        .collect();

    stats.sort_by_key(|s| s.hour);
    stats
}

/// Bucket by local-time weekday and pick the best and worst day by
/// success rate.
pub fn weekly_pattern(history: &[HistoryEntry]) -> WeeklyPattern {
    let mut buckets: HashMap<Weekday, Vec<&HistoryEntry>> = HashMap::new();
    for entry in history {
        let weekday = entry.timestamp.with_timezone(&Local).weekday();
        buckets.entry(weekday).or_default().push(entry);
    }

    let day_stats = |weekday: Weekday| -> DayStats {
        let Some(entries) = buckets.get(&weekday) else {
            return DayStats::default();
        };
        let successes: Vec<_> = entries.iter().filter(|e| e.success).collect();
        let avg = if successes.is_empty() {
            Duration::ZERO
        } else {
            let total: Duration = successes.iter().map(|e| e.duration).sum();
            total / successes.len() as u32
        };
        DayStats {
            avg_response_time: avg,
            success_rate: successes.len() as f64 / entries.len() as f64 * 100.0,
            check_count: entries.len() as i64,
        }
    };

    let mut pattern = WeeklyPattern {
        monday: day_stats(Weekday::Mon),
        tuesday: day_stats(Weekday::Tue),
        wednesday: day_stats(Weekday::Wed),
        thursday: day_stats(Weekday::Thu),
        friday: day_stats(Weekday::Fri),
        saturday: day_stats(Weekday::Sat),
        sunday: day_stats(Weekday::Sun),
        best_day: String::new(),
        worst_day: String::new(),
    };

    let named_days = [
        (Weekday::Mon, "Monday"),
        (Weekday::Tue, "Tuesday"),
        (Weekday::Wed, "Wednesday"),
        (Weekday::Thu, "Thursday"),
        (Weekday::Fri, "Friday"),
        (Weekday::Sat, "Saturday"),
        (Weekday::Sun, "Sunday"),
    ];

    let mut best_rate = -1.0;
    let mut worst_rate = 101.0;
    for (weekday, name) in named_days {
        if !buckets.contains_key(&weekday) {
            continue;
        }
        let rate = day_stats(weekday).success_rate;
        if rate > best_rate {
            best_rate = rate;
            pattern.best_day = name.to_string();
        }
        if rate < worst_rate {
            worst_rate = rate;
            pattern.worst_day = name.to_string();
        }
    }

    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_at(ts: DateTime<Utc>, success: bool, duration_ms: u64, error: &str) -> HistoryEntry {
        HistoryEntry {
            id: 0,
            site_name: "A".to_string(),
            url: "https://a.example.com".to_string(),
            status: if success { 200 } else { 503 },
            duration: Duration::from_millis(duration_ms),
            success,
            error: error.to_string(),
            timestamp: ts,
            created_at: ts,
        }
    }

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    /// Newest-first history from an oldest-first pattern string of
    /// 'S' (success) and 'F' (failure), one probe per minute.
    fn history_from_pattern(pattern: &str) -> Vec<HistoryEntry> {
        let base = base_time();
        let mut entries: Vec<HistoryEntry> = pattern
            .chars()
            .enumerate()
            .map(|(i, c)| {
                entry_at(
                    base + chrono::Duration::minutes(i as i64),
                    c == 'S',
                    100,
                    if c == 'S' { "" } else { "503 service unavailable" },
                )
            })
            .collect();
        entries.reverse();
        entries
    }

    fn approx_eq(a: Duration, b: Duration, tolerance: Duration) {
        let diff = if a > b { a - b } else { b - a };
        assert!(diff <= tolerance, "expected {a:?} ~= {b:?}");
    }

    #[test]
    fn percentile_fixpoints() {
        let durations: Vec<Duration> = [10u64, 20, 30, 40, 50]
            .iter()
            .map(|&ms| Duration::from_millis(ms))
            .collect();

        let epsilon = Duration::from_micros(100);
        approx_eq(percentile(&durations, 50.0), Duration::from_millis(30), epsilon);
        approx_eq(percentile(&durations, 90.0), Duration::from_millis(46), epsilon);
        approx_eq(percentile(&durations, 95.0), Duration::from_millis(48), epsilon);
        approx_eq(
            percentile(&durations, 99.0),
            Duration::from_micros(49_600),
            epsilon,
        );
        approx_eq(
            percentile(&durations, 99.9),
            Duration::from_micros(49_960),
            epsilon,
        );
    }

    #[test]
    fn percentiles_are_monotonic() {
        let durations: Vec<Duration> = [3u64, 14, 15, 92, 65, 35, 89, 79, 32, 38]
            .iter()
            .map(|&ms| Duration::from_millis(ms))
            .collect();
        let mut sorted = durations.clone();
        sorted.sort();

        let p50 = percentile(&sorted, 50.0);
        let p90 = percentile(&sorted, 90.0);
        let p95 = percentile(&sorted, 95.0);
        let p99 = percentile(&sorted, 99.0);
        let p999 = percentile(&sorted, 99.9);
        assert!(p50 <= p90 && p90 <= p95 && p95 <= p99 && p99 <= p999);
    }

    #[test]
    fn single_sample_collapses_percentiles() {
        let durations = vec![Duration::from_millis(42)];
        for p in [50.0, 90.0, 95.0, 99.0, 99.9] {
            assert_eq!(percentile(&durations, p), Duration::from_millis(42));
        }
        assert_eq!(std_deviation(&durations), Duration::ZERO);
    }

    #[test]
    fn empty_percentile_is_zero() {
        assert_eq!(percentile(&[], 50.0), Duration::ZERO);
        assert_eq!(std_deviation(&[]), Duration::ZERO);
    }

    #[test]
    fn std_deviation_population() {
        let durations: Vec<Duration> = [2u64, 4, 4, 4, 5, 5, 7, 9]
            .iter()
            .map(|&ms| Duration::from_millis(ms))
            .collect();
        // Known population sigma of 2 for this set.
        approx_eq(
            std_deviation(&durations),
            Duration::from_millis(2),
            Duration::from_micros(10),
        );
    }

    #[test]
    fn nines_grading() {
        assert_eq!(nines(100.0), 5);
        assert_eq!(nines(99.999), 5);
        assert_eq!(nines(99.995), 4);
        assert_eq!(nines(99.95), 3);
        assert_eq!(nines(99.5), 2);
        assert_eq!(nines(95.0), 1);
        assert_eq!(nines(89.9), 0);
    }

    #[test]
    fn downtime_events_mttr_mtbf_scenario() {
        // Oldest first: S F F S F F F S over eight minutes.
        let history = history_from_pattern("SFFSFFFS");
        let now = base_time() + chrono::Duration::minutes(10);

        let events = downtime_events(&history, now);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].duration, Duration::from_secs(120));
        assert_eq!(events[1].duration, Duration::from_secs(180));

        let mttr = mean_time_to_recovery(&events);
        assert_eq!(mttr, Duration::from_secs(150));

        let total_period = Duration::from_secs(600);
        let mtbf = mean_time_between_failures(&events, total_period);
        assert_eq!(mtbf, Duration::from_secs(300));
    }

    #[test]
    fn ongoing_downtime_closes_at_now() {
        let history = history_from_pattern("SFF");
        let now = base_time() + chrono::Duration::minutes(5);

        let events = downtime_events(&history, now);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].started_at, base_time() + chrono::Duration::minutes(1));
        assert_eq!(events[0].ended_at, now);
        assert_eq!(events[0].duration, Duration::from_secs(240));
    }

    #[test]
    fn single_event_mtbf_is_whole_period() {
        let history = history_from_pattern("SFFS");
        let now = base_time() + chrono::Duration::minutes(10);
        let events = downtime_events(&history, now);
        assert_eq!(events.len(), 1);
        assert_eq!(
            mean_time_between_failures(&events, Duration::from_secs(600)),
            Duration::from_secs(600)
        );
    }

    #[test]
    fn all_success_has_no_events() {
        let history = history_from_pattern("SSSS");
        let now = base_time() + chrono::Duration::minutes(10);
        assert!(downtime_events(&history, now).is_empty());
    }

    #[test]
    fn response_trend_needs_ten_samples() {
        let history = history_from_pattern("SSSSSSSSS");
        assert_eq!(response_time_trend(&history), Trend::Unknown);
    }

    #[test]
    fn response_trend_detects_degradation() {
        // Newest half at 300ms, older half at 100ms.
        let base = base_time();
        let mut entries = Vec::new();
        for i in 0..10 {
            let ms = if i < 5 { 100 } else { 300 };
            entries.push(entry_at(base + chrono::Duration::minutes(i), true, ms, ""));
        }
        entries.reverse();
        assert_eq!(response_time_trend(&entries), Trend::Degrading);
    }

    #[test]
    fn response_trend_detects_improvement_and_stability() {
        let base = base_time();

        let mut improving = Vec::new();
        for i in 0..10 {
            let ms = if i < 5 { 300 } else { 100 };
            improving.push(entry_at(base + chrono::Duration::minutes(i), true, ms, ""));
        }
        improving.reverse();
        assert_eq!(response_time_trend(&improving), Trend::Improving);

        let stable = history_from_pattern("SSSSSSSSSS");
        assert_eq!(response_time_trend(&stable), Trend::Stable);
    }

    #[test]
    fn uptime_trend_needs_twenty_samples() {
        let history = history_from_pattern("SSSSSSSSSSSSSSSSSSS");
        assert_eq!(uptime_trend(&history), Trend::Unknown);
    }

    #[test]
    fn uptime_trend_quarters() {
        // Oldest quarter all failures, newest quarter all successes.
        let improving = history_from_pattern("FFFFFSSSSSSSSSSSSSSS");
        assert_eq!(uptime_trend(&improving), Trend::Improving);

        let degrading = history_from_pattern("SSSSSSSSSSSSSSSFFFFF");
        assert_eq!(uptime_trend(&degrading), Trend::Degrading);

        let stable = history_from_pattern("SSSSSSSSSSSSSSSSSSSS");
        assert_eq!(uptime_trend(&stable), Trend::Stable);
    }

    #[test]
    fn classifies_error_patterns_in_order() {
        assert_eq!(classify_error("request timeout exceeded"), "Timeout");
        assert_eq!(classify_error("context deadline exceeded"), "Timeout");
        assert_eq!(classify_error("connection reset by peer"), "Network");
        assert_eq!(classify_error("no such host: dns lookup failed"), "DNS");
        assert_eq!(classify_error("TLS handshake failure"), "SSL/TLS");
        assert_eq!(classify_error("refused"), "Connection Refused");
        assert_eq!(classify_error("HTTP 503"), "Server Error (5xx)");
        assert_eq!(classify_error("HTTP 404"), "Client Error (4xx)");
        assert_eq!(classify_error("something odd"), "Other");
    }

    #[test]
    fn error_classifier_is_knowingly_loose_on_digits() {
        // Any message containing both digits trips the 5xx class.
        assert_eq!(classify_error("worker 50 died"), "Server Error (5xx)");
    }

    #[test]
    fn error_breakdown_counts_and_seen_times() {
        let base = base_time();
        let mut entries = vec![
            entry_at(base, false, 0, "HTTP 503"),
            entry_at(base + chrono::Duration::minutes(1), true, 100, ""),
            entry_at(base + chrono::Duration::minutes(2), false, 0, "HTTP 503"),
            entry_at(base + chrono::Duration::minutes(3), false, 0, ""),
        ];
        entries.reverse();

        let breakdown = error_breakdown(&entries, 3);
        assert_eq!(breakdown.len(), 2);

        let http = &breakdown["HTTP 503"];
        assert_eq!(http.count, 2);
        assert!((http.percentage - 66.666).abs() < 0.01);
        assert_eq!(http.first_seen, base);
        assert_eq!(http.last_seen, base + chrono::Duration::minutes(2));
        assert_eq!(http.pattern, "Server Error (5xx)");

        let unknown = &breakdown["Unknown Error"];
        assert_eq!(unknown.count, 1);
        assert_eq!(unknown.pattern, "Other");
    }

    #[test]
    fn sla_compliance_targets() {
        let compliance = sla_compliance(99.96);
        assert_eq!(compliance.len(), 5);

        assert!(compliance["99.9% (8.77h downtime/month)"].compliant);
        assert!(compliance["99.95% (4.38h downtime/month)"].compliant);
        assert!(!compliance["99.99% (52.6min downtime/month)"].compliant);

        let violated = &compliance["99.99% (52.6min downtime/month)"];
        // (99.99 - 99.96)/100 of a 30-day month, about 13 minutes.
        let expected = Duration::from_secs(30 * 24 * 3600).mul_f64(0.03 / 100.0);
        let diff = if violated.violation_duration > expected {
            violated.violation_duration - expected
        } else {
            expected - violated.violation_duration
        };
        assert!(diff < Duration::from_secs(1));

        let met = &compliance["95% (36.5h downtime/month)"];
        assert_eq!(met.violation_duration, Duration::ZERO);
    }

    #[test]
    fn hourly_pattern_omits_empty_buckets() {
        let base = base_time();
        let entries = vec![
            entry_at(base, true, 100, ""),
            entry_at(base + chrono::Duration::minutes(5), false, 0, "x"),
        ];

        let pattern = hourly_pattern(&entries);
        assert_eq!(pattern.len(), 1);
        assert_eq!(pattern[0].check_count, 2);
        assert_eq!(pattern[0].success_rate, 50.0);
        assert_eq!(pattern[0].avg_response_time, Duration::from_millis(100));
    }

    #[test]
    fn weekly_pattern_best_and_worst() {
        let base = base_time();
        let mut entries = Vec::new();
        // One perfect day, one bad day two days later.
        for i in 0..4 {
            entries.push(entry_at(base + chrono::Duration::minutes(i), true, 100, ""));
        }
        for i in 0..4 {
            entries.push(entry_at(
                base + chrono::Duration::days(2) + chrono::Duration::minutes(i),
                i == 0,
                100,
                "err",
            ));
        }

        let pattern = weekly_pattern(&entries);
        assert!(!pattern.best_day.is_empty());
        assert!(!pattern.worst_day.is_empty());
        assert_ne!(pattern.best_day, pattern.worst_day);
    }

    #[test]
    fn compute_metrics_assembles_bundle() {
        let history = history_from_pattern("SFFSFFFS");
        let now = base_time() + chrono::Duration::minutes(10);

        let metrics = compute_metrics("A", "10m", &history, now);
        assert_eq!(metrics.total_checks, 8);
        assert_eq!(metrics.successful_checks, 3);
        assert_eq!(metrics.failed_checks, 5);
        assert!((metrics.uptime_percent - 37.5).abs() < 0.001);
        assert_eq!(metrics.availability_nines, 0);
        assert_eq!(metrics.mttr, Duration::from_secs(150));
        assert_eq!(metrics.mtbf, Duration::from_secs(300));
        assert_eq!(metrics.first_check, base_time());
        assert_eq!(
            metrics.last_check,
            base_time() + chrono::Duration::minutes(7)
        );
        assert_eq!(metrics.error_breakdown.len(), 1);
    }
}
