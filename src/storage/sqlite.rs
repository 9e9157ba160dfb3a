//! SQLite storage implementation.
//!
//! ## Characteristics
//!
//! - **Embedded**: no separate database server required
//! - **WAL mode**: readers proceed while a writer is active
//! - **Connection pooling**: bounded at 10 connections
//! - **Idempotent schema**: one `results` table, four indexes, created
//!   with `IF NOT EXISTS` on every `init()`
//!
//! Timestamps are stored as Unix milliseconds, durations as integer
//! nanoseconds, so rows round-trip exactly at the precision the
//! windowed queries compare on.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::error::{StorageError, StorageResult};
use super::{HistoryEntry, Stats, Store};
use crate::monitor::result::ProbeResult;

/// SQLite-backed store.
///
/// On top of the pool, a read-write lock serializes writers against
/// each other while letting windowed reads run concurrently.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    lock: RwLock<()>,
}

impl SqliteStore {
    /// Open (creating if missing) the database file and build the pool.
    /// Call `init()` before first use.
    #[instrument(skip_all)]
    pub async fn open(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path = db_path.as_ref();

        info!("opening SQLite store at {}", db_path.display());

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(30))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            pool,
            lock: RwLock::new(()),
        })
    }

    fn ts_to_millis(ts: &DateTime<Utc>) -> i64 {
        ts.timestamp_millis()
    }

    fn millis_to_ts(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> HistoryEntry {
        HistoryEntry {
            id: row.get("id"),
            site_name: row.get("site_name"),
            url: row.get("url"),
            status: row.get::<i64, _>("status_code") as u16,
            duration: std::time::Duration::from_nanos(
                row.get::<i64, _>("response_time_ns").max(0) as u64,
            ),
            success: row.get("success"),
            error: row.get("error_message"),
            timestamp: Self::millis_to_ts(row.get("timestamp")),
            created_at: Self::millis_to_ts(row.get("created_at")),
        }
    }

    async fn scan_history<'q>(
        &self,
        query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> StorageResult<Vec<HistoryEntry>> {
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(rows.iter().map(Self::row_to_entry).collect())
    }

    /// One-pass stats query; aggregates over successful rows only.
    /// Callers hold the read guard.
    async fn stats_locked(&self, site_name: &str, since: DateTime<Utc>) -> StorageResult<Stats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_checks,
                COALESCE(SUM(CASE WHEN success = 1 THEN 1 ELSE 0 END), 0) AS successful_checks,
                COALESCE(AVG(CASE WHEN success = 1 THEN response_time_ns END), 0.0) AS avg_ns,
                COALESCE(MIN(CASE WHEN success = 1 THEN response_time_ns END), 0) AS min_ns,
                COALESCE(MAX(CASE WHEN success = 1 THEN response_time_ns END), 0) AS max_ns,
                MIN(timestamp) AS first_check,
                MAX(timestamp) AS last_check
            FROM results
            WHERE site_name = ? AND timestamp >= ?
            "#,
        )
        .bind(site_name)
        .bind(Self::ts_to_millis(&since))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let total_checks: i64 = row.get("total_checks");
        let successful_checks: i64 = row.get("successful_checks");
        let avg_ns: f64 = row.get("avg_ns");
        let min_ns: i64 = row.get("min_ns");
        let max_ns: i64 = row.get("max_ns");
        let first_check: Option<i64> = row.get("first_check");
        let last_check: Option<i64> = row.get("last_check");

        if total_checks == 0 {
            return Ok(Stats::empty(site_name));
        }

        let mut stats = Stats {
            site_name: site_name.to_string(),
            total_checks,
            successful_checks,
            failed_checks: total_checks - successful_checks,
            success_rate: successful_checks as f64 / total_checks as f64 * 100.0,
            avg_response_time: std::time::Duration::from_nanos(avg_ns.max(0.0) as u64),
            min_response_time: std::time::Duration::from_nanos(min_ns.max(0) as u64),
            max_response_time: std::time::Duration::from_nanos(max_ns.max(0) as u64),
            first_check: first_check.map(Self::millis_to_ts),
            last_check: last_check.map(Self::millis_to_ts),
            uptime: std::time::Duration::ZERO,
            downtime: std::time::Duration::ZERO,
        };
        stats.derive_window_durations();

        Ok(stats)
    }
}

const SELECT_COLUMNS: &str = "id, site_name, url, status_code, response_time_ns, success, error_message, timestamp, created_at";

#[async_trait]
impl Store for SqliteStore {
    #[instrument(skip(self))]
    async fn init(&self) -> StorageResult<()> {
        let _guard = self.lock.write().await;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_name TEXT NOT NULL,
                url TEXT NOT NULL,
                status_code INTEGER DEFAULT 0,
                response_time_ns INTEGER NOT NULL,
                success BOOLEAN NOT NULL,
                error_message TEXT DEFAULT '',
                timestamp INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::SchemaFailed(e.to_string()))?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_site_timestamp ON results(site_name, timestamp DESC)",
            "CREATE INDEX IF NOT EXISTS idx_timestamp ON results(timestamp DESC)",
            "CREATE INDEX IF NOT EXISTS idx_site_success ON results(site_name, success)",
            "CREATE INDEX IF NOT EXISTS idx_success_timestamp ON results(success, timestamp DESC)",
        ];
        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::SchemaFailed(e.to_string()))?;
        }

        debug!("schema ready");
        Ok(())
    }

    #[instrument(skip(self, result), fields(site = %result.site_name))]
    async fn save_result(&self, result: &ProbeResult) -> StorageResult<()> {
        let _guard = self.lock.write().await;

        sqlx::query(
            r#"
            INSERT INTO results (site_name, url, status_code, response_time_ns, success, error_message, timestamp, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&result.site_name)
        .bind(&result.url)
        .bind(result.status as i64)
        .bind(result.duration.as_nanos() as i64)
        .bind(result.success)
        .bind(&result.error)
        .bind(Self::ts_to_millis(&result.timestamp))
        .bind(Self::ts_to_millis(&Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn history(
        &self,
        site_name: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<HistoryEntry>> {
        let _guard = self.lock.read().await;

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM results
             WHERE site_name = ? AND timestamp >= ?
             ORDER BY timestamp DESC, id DESC"
        );

        self.scan_history(
            sqlx::query(&sql)
                .bind(site_name)
                .bind(Self::ts_to_millis(&since)),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn all_history(&self, since: DateTime<Utc>) -> StorageResult<Vec<HistoryEntry>> {
        let _guard = self.lock.read().await;

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM results
             WHERE timestamp >= ?
             ORDER BY timestamp DESC, id DESC"
        );

        self.scan_history(sqlx::query(&sql).bind(Self::ts_to_millis(&since)))
            .await
    }

    #[instrument(skip(self))]
    async fn stats(&self, site_name: &str, since: DateTime<Utc>) -> StorageResult<Stats> {
        let _guard = self.lock.read().await;
        self.stats_locked(site_name, since).await
    }

    #[instrument(skip(self))]
    async fn all_stats(&self, since: DateTime<Utc>) -> StorageResult<HashMap<String, Stats>> {
        let _guard = self.lock.read().await;

        let rows = sqlx::query("SELECT DISTINCT site_name FROM results WHERE timestamp >= ?")
            .bind(Self::ts_to_millis(&since))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let mut all = HashMap::new();
        for row in rows {
            let site_name: String = row.get("site_name");
            let stats = self.stats_locked(&site_name, since).await?;
            all.insert(site_name, stats);
        }

        Ok(all)
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite store");
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ms_ts(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn result_at(site: &str, ts: DateTime<Utc>, success: bool, duration_ms: u64) -> ProbeResult {
        ProbeResult {
            site_name: site.to_string(),
            url: format!("https://{}.example.com", site.to_lowercase()),
            status: if success { 200 } else { 503 },
            duration: Duration::from_millis(duration_ms),
            timestamp: ts,
            success,
            error: if success {
                String::new()
            } else {
                "503 service unavailable".to_string()
            },
        }
    }

    async fn open_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.db")).await.unwrap();
        store.init().await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let (_dir, store) = open_store().await;
        store.init().await.unwrap();
        store.init().await.unwrap();

        let base = ms_ts(1_700_000_000_000);
        store
            .save_result(&result_at("A", base, true, 100))
            .await
            .unwrap();
        let history = store.history("A", ms_ts(0)).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn save_then_history_round_trips_fields() {
        let (_dir, store) = open_store().await;

        let ts = ms_ts(1_700_000_123_456);
        let result = result_at("Example", ts, false, 250);
        store.save_result(&result).await.unwrap();

        let history = store.history("Example", ms_ts(0)).await.unwrap();
        assert_eq!(history.len(), 1);

        let entry = &history[0];
        assert_eq!(entry.site_name, result.site_name);
        assert_eq!(entry.url, result.url);
        assert_eq!(entry.status, result.status);
        assert_eq!(entry.duration, result.duration);
        assert_eq!(entry.success, result.success);
        assert_eq!(entry.error, result.error);
        assert_eq!(entry.timestamp, result.timestamp);
    }

    #[tokio::test]
    async fn history_is_newest_first_with_id_tiebreak() {
        let (_dir, store) = open_store().await;
        let base = ms_ts(1_700_000_000_000);

        store
            .save_result(&result_at("A", base, true, 100))
            .await
            .unwrap();
        store
            .save_result(&result_at("A", base + chrono::Duration::seconds(10), true, 110))
            .await
            .unwrap();
        // Same timestamp as the second row: the later insert wins the tie.
        store
            .save_result(&result_at("A", base + chrono::Duration::seconds(10), false, 0))
            .await
            .unwrap();

        let history = store.history("A", ms_ts(0)).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(!history[0].success);
        assert!(history[1].success);
        assert_eq!(history[2].timestamp, base);
        assert!(history[0].id > history[1].id);
    }

    #[tokio::test]
    async fn history_window_excludes_older_rows() {
        let (_dir, store) = open_store().await;
        let base = ms_ts(1_700_000_000_000);

        for i in 0..10 {
            store
                .save_result(&result_at(
                    "A",
                    base + chrono::Duration::minutes(i),
                    true,
                    100,
                ))
                .await
                .unwrap();
        }

        let since = base + chrono::Duration::minutes(5);
        let history = store.history("A", since).await.unwrap();
        assert_eq!(history.len(), 5);
        assert!(history.iter().all(|e| e.timestamp >= since));
    }

    #[tokio::test]
    async fn stats_empty_window_is_zeroed_with_name() {
        let (_dir, store) = open_store().await;

        let stats = store.stats("Ghost", ms_ts(0)).await.unwrap();
        assert_eq!(stats.site_name, "Ghost");
        assert_eq!(stats.total_checks, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.avg_response_time, Duration::ZERO);
        assert!(stats.first_check.is_none());
    }

    #[tokio::test]
    async fn stats_aggregates_successful_rows_only() {
        let (_dir, store) = open_store().await;
        let base = ms_ts(1_700_000_000_000);

        store
            .save_result(&result_at("A", base, true, 100))
            .await
            .unwrap();
        store
            .save_result(&result_at("A", base + chrono::Duration::minutes(1), true, 300))
            .await
            .unwrap();
        store
            .save_result(&result_at("A", base + chrono::Duration::minutes(2), false, 999))
            .await
            .unwrap();

        let stats = store.stats("A", ms_ts(0)).await.unwrap();
        assert_eq!(stats.total_checks, 3);
        assert_eq!(stats.successful_checks, 2);
        assert_eq!(stats.failed_checks, 1);
        assert!((stats.success_rate - 66.666).abs() < 0.01);
        assert_eq!(stats.avg_response_time, Duration::from_millis(200));
        assert_eq!(stats.min_response_time, Duration::from_millis(100));
        assert_eq!(stats.max_response_time, Duration::from_millis(300));
        assert_eq!(stats.first_check, Some(base));
        assert_eq!(
            stats.last_check,
            Some(base + chrono::Duration::minutes(2))
        );
    }

    #[tokio::test]
    async fn stats_all_failures_zero_response_times() {
        let (_dir, store) = open_store().await;
        let base = ms_ts(1_700_000_000_000);

        for i in 0..3 {
            store
                .save_result(&result_at(
                    "A",
                    base + chrono::Duration::minutes(i),
                    false,
                    500,
                ))
                .await
                .unwrap();
        }

        let stats = store.stats("A", ms_ts(0)).await.unwrap();
        assert_eq!(stats.total_checks, 3);
        assert_eq!(stats.successful_checks, 0);
        assert_eq!(stats.avg_response_time, Duration::ZERO);
        assert_eq!(stats.min_response_time, Duration::ZERO);
        assert_eq!(stats.max_response_time, Duration::ZERO);
    }

    #[tokio::test]
    async fn all_stats_discovers_sites_in_window() {
        let (_dir, store) = open_store().await;
        let base = ms_ts(1_700_000_000_000);

        store
            .save_result(&result_at("A", base, true, 100))
            .await
            .unwrap();
        store
            .save_result(&result_at("B", base, false, 0))
            .await
            .unwrap();

        let all = store.all_stats(ms_ts(0)).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["A"].successful_checks, 1);
        assert_eq!(all["B"].failed_checks, 1);

        // Window after both rows: nothing discovered.
        let later = store
            .all_stats(base + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert!(later.is_empty());
    }

    #[tokio::test]
    async fn all_history_interleaves_sites_by_time() {
        let (_dir, store) = open_store().await;
        let base = ms_ts(1_700_000_000_000);

        store
            .save_result(&result_at("A", base, true, 100))
            .await
            .unwrap();
        store
            .save_result(&result_at("B", base + chrono::Duration::seconds(30), true, 100))
            .await
            .unwrap();
        store
            .save_result(&result_at("A", base + chrono::Duration::seconds(60), true, 100))
            .await
            .unwrap();

        let history = store.all_history(ms_ts(0)).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].site_name, "A");
        assert_eq!(history[1].site_name, "B");
        assert_eq!(history[2].site_name, "A");
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_lose_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(
            SqliteStore::open(dir.path().join("test.db")).await.unwrap(),
        );
        store.init().await.unwrap();

        let base = ms_ts(1_700_000_000_000);
        let mut handles = Vec::new();
        for w in 0..4i64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25i64 {
                    let ts = base + chrono::Duration::milliseconds(w * 1000 + i);
                    store
                        .save_result(&result_at("A", ts, true, 100))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = store.stats("A", ms_ts(0)).await.unwrap();
        assert_eq!(stats.total_checks, 100);
    }
}
