//! Session-scoped telemetry history.
//!
//! Snapshots go to SQLite when it is available. Persistence problems never
//! reach the caller: a failed write still hands back a local id, and a store
//! that is unreachable serves a synthetic series seeded from the most recent
//! real capture of the session (see [`super::synthetic`]).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, warn};

use super::{synthetic, SnapshotId, TelemetrySnapshot};

/// Per-session aggregate over stored snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub snapshot_count: i64,
    pub first_captured_at: DateTime<Utc>,
    pub last_captured_at: DateTime<Utc>,
}

/// Append-only snapshot store with degraded-mode fallback.
pub struct TelemetryStore {
    db: Option<SqlitePool>,
    /// Serializes appends so rows land in arrival order.
    writes: Mutex<()>,
    /// Most recent real snapshot per session; seeds the synthetic series.
    latest: RwLock<HashMap<String, TelemetrySnapshot>>,
    next_local_id: AtomicU64,
}

impl TelemetryStore {
    /// `None` means no durable backend could be opened: the store starts in
    /// degraded mode and stays there.
    pub fn new(db: Option<SqlitePool>) -> Self {
        if db.is_none() {
            warn!("Telemetry store running without persistence (degraded mode)");
        }
        Self {
            db,
            writes: Mutex::new(()),
            latest: RwLock::new(HashMap::new()),
            next_local_id: AtomicU64::new(1),
        }
    }

    /// Whether a durable backend is configured.
    pub fn is_durable(&self) -> bool {
        self.db.is_some()
    }

    /// Persist one snapshot. Falls back to a local id if the write fails.
    pub async fn append(&self, snapshot: &TelemetrySnapshot) -> SnapshotId {
        self.latest
            .write()
            .await
            .insert(snapshot.session_id.clone(), snapshot.clone());

        let Some(ref db) = self.db else {
            return self.local_id();
        };

        let _guard = self.writes.lock().await;
        let result = sqlx::query(
            "INSERT INTO telemetry_snapshots \
             (session_id, captured_at, battery_level, memory_used_mb) VALUES (?, ?, ?, ?)",
        )
        .bind(&snapshot.session_id)
        .bind(encode_instant(&snapshot.captured_at))
        .bind(snapshot.battery_level_percent.map(i64::from))
        .bind(snapshot.memory_used_mb.and_then(|mb| i64::try_from(mb).ok()))
        .execute(db)
        .await;

        match result {
            Ok(done) => {
                let id = done.last_insert_rowid();
                debug!(id, session_id = %snapshot.session_id, "Stored telemetry snapshot");
                SnapshotId::Stored(id)
            }
            Err(e) => {
                warn!(session_id = %snapshot.session_id, "Telemetry write failed, snapshot not persisted: {e}");
                self.local_id()
            }
        }
    }

    /// Up to `limit` most recent snapshots of `session_id`, oldest first.
    pub async fn history(&self, session_id: &str, limit: usize) -> Vec<TelemetrySnapshot> {
        if limit == 0 {
            return Vec::new();
        }
        let Some(ref db) = self.db else {
            return self.synthetic_history(session_id, limit).await;
        };

        let rows = sqlx::query(
            "SELECT session_id, captured_at, battery_level, memory_used_mb \
             FROM telemetry_snapshots WHERE session_id = ? \
             ORDER BY captured_at DESC, id DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(db)
        .await;

        match rows {
            Ok(rows) => {
                let mut snapshots: Vec<TelemetrySnapshot> = rows
                    .into_iter()
                    .filter_map(|row| match snapshot_from_row(&row) {
                        Ok(snapshot) => Some(snapshot),
                        Err(e) => {
                            warn!("Skipping unreadable telemetry row: {e}");
                            None
                        }
                    })
                    .collect();
                // Storage order is newest first.
                snapshots.reverse();
                snapshots
            }
            Err(e) => {
                warn!(session_id, "Telemetry read failed, serving synthetic history: {e}");
                self.synthetic_history(session_id, limit).await
            }
        }
    }

    /// Remove every snapshot of every session. Returns the number removed.
    pub async fn clear(&self) -> u64 {
        self.latest.write().await.clear();

        let Some(ref db) = self.db else {
            return 0;
        };

        let _guard = self.writes.lock().await;
        match sqlx::query("DELETE FROM telemetry_snapshots")
            .execute(db)
            .await
        {
            Ok(done) => done.rows_affected(),
            Err(e) => {
                error!("Failed to clear telemetry: {e}");
                0
            }
        }
    }

    /// Stored sessions, most recently active first.
    pub async fn sessions(&self) -> Vec<SessionSummary> {
        let Some(ref db) = self.db else {
            return Vec::new();
        };

        let rows = sqlx::query(
            "SELECT session_id, COUNT(*) AS snapshot_count, \
             MIN(captured_at) AS first_captured_at, MAX(captured_at) AS last_captured_at \
             FROM telemetry_snapshots GROUP BY session_id ORDER BY last_captured_at DESC",
        )
        .fetch_all(db)
        .await;

        match rows {
            Ok(rows) => rows
                .iter()
                .filter_map(|row| summary_from_row(row).ok())
                .collect(),
            Err(e) => {
                warn!("Failed to list telemetry sessions: {e}");
                Vec::new()
            }
        }
    }

    async fn synthetic_history(&self, session_id: &str, limit: usize) -> Vec<TelemetrySnapshot> {
        match self.latest.read().await.get(session_id) {
            Some(seed) => synthetic::trailing_series(seed, limit),
            None => Vec::new(),
        }
    }

    fn local_id(&self) -> SnapshotId {
        SnapshotId::Local(self.next_local_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Fixed-width UTC timestamp so lexical order matches time order.
fn encode_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_instant(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn snapshot_from_row(row: &SqliteRow) -> Result<TelemetrySnapshot, sqlx::Error> {
    let captured_at: String = row.try_get("captured_at")?;
    Ok(TelemetrySnapshot {
        captured_at: decode_instant(&captured_at)?,
        battery_level_percent: row
            .try_get::<Option<i64>, _>("battery_level")?
            .and_then(|v| u8::try_from(v).ok()),
        memory_used_mb: row
            .try_get::<Option<i64>, _>("memory_used_mb")?
            .and_then(|v| u64::try_from(v).ok()),
        session_id: row.try_get("session_id")?,
        synthetic: false,
    })
}

fn summary_from_row(row: &SqliteRow) -> Result<SessionSummary, sqlx::Error> {
    let first: String = row.try_get("first_captured_at")?;
    let last: String = row.try_get("last_captured_at")?;
    Ok(SessionSummary {
        session_id: row.try_get("session_id")?,
        snapshot_count: row.try_get("snapshot_count")?,
        first_captured_at: decode_instant(&first)?,
        last_captured_at: decode_instant(&last)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn durable_store() -> TelemetryStore {
        let pool = crate::db::init(":memory:").await.expect("DB init failed");
        TelemetryStore::new(Some(pool))
    }

    fn snapshot_at(session: &str, base: DateTime<Utc>, offset_secs: i64, battery: u8) -> TelemetrySnapshot {
        TelemetrySnapshot::new(
            session,
            base + Duration::seconds(offset_secs),
            Some(battery),
            Some(1000 + offset_secs as u64),
        )
    }

    #[tokio::test]
    async fn test_history_returns_most_recent_oldest_first() {
        let store = durable_store().await;
        let base = Utc::now();
        for i in 0..5 {
            let id = store.append(&snapshot_at("s1", base, i, 90 - i as u8)).await;
            assert!(id.is_persisted());
        }

        let history = store.history("s1", 3).await;

        assert_eq!(history.len(), 3);
        assert_eq!(
            history.iter().map(|s| s.battery_level_percent).collect::<Vec<_>>(),
            vec![Some(88), Some(87), Some(86)]
        );
        for pair in history.windows(2) {
            assert!(pair[0].captured_at < pair[1].captured_at);
        }
    }

    #[tokio::test]
    async fn test_history_ties_broken_by_insertion_order() {
        let store = durable_store().await;
        let at = Utc::now();
        store.append(&snapshot_at("s1", at, 0, 10)).await;
        store.append(&snapshot_at("s1", at, 0, 20)).await;
        store.append(&snapshot_at("s1", at, 0, 30)).await;

        let levels: Vec<_> = store
            .history("s1", 10)
            .await
            .iter()
            .map(|s| s.battery_level_percent)
            .collect();
        assert_eq!(levels, vec![Some(10), Some(20), Some(30)]);
    }

    #[tokio::test]
    async fn test_history_round_trips_partial_snapshot() {
        let store = durable_store().await;
        let snapshot = TelemetrySnapshot::new("s1", Utc::now(), None, Some(512));
        store.append(&snapshot).await;

        let history = store.history("s1", 5).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].battery_level_percent, None);
        assert_eq!(history[0].memory_used_mb, Some(512));
        // Microsecond precision survives storage.
        assert_eq!(
            history[0].captured_at.timestamp_micros(),
            snapshot.captured_at.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_sessions_are_isolated_and_clear_removes_all() {
        let store = durable_store().await;
        let base = Utc::now();
        store.append(&snapshot_at("old", base, 0, 50)).await;
        store.append(&snapshot_at("old", base, 1, 49)).await;
        store.append(&snapshot_at("new", base, 2, 48)).await;

        assert_eq!(store.history("old", 10).await.len(), 2);
        assert_eq!(store.history("new", 10).await.len(), 1);

        let sessions = store.sessions().await;
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, "new");
        assert_eq!(sessions[1].snapshot_count, 2);

        assert_eq!(store.clear().await, 3);
        assert!(store.history("old", 10).await.is_empty());
        assert!(store.sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_store_serves_synthetic_series() {
        let store = TelemetryStore::new(None);
        assert!(store.history("s1", 10).await.is_empty());

        let real = TelemetrySnapshot::new("s1", Utc::now(), Some(70), Some(3000));
        let id = store.append(&real).await;
        assert!(!id.is_persisted());

        let history = store.history("s1", 10).await;
        assert_eq!(history.len(), 10);
        assert_eq!(history.last(), Some(&real));
        assert!(history[..9].iter().all(|s| s.synthetic));
        assert!(store.history("other", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_returns_local_id() {
        let pool = crate::db::init(":memory:").await.expect("DB init failed");
        let store = TelemetryStore::new(Some(pool.clone()));
        pool.close().await;

        let real = TelemetrySnapshot::new("s1", Utc::now(), Some(55), None);
        let first = store.append(&real).await;
        let second = store.append(&real).await;
        assert_eq!(first, SnapshotId::Local(1));
        assert_eq!(second, SnapshotId::Local(2));

        // Reads fail as well, so history degrades to the synthetic series.
        let history = store.history("s1", 4).await;
        assert_eq!(history.len(), 4);
        assert_eq!(history.last(), Some(&real));
        assert_eq!(store.clear().await, 0);
    }
}
