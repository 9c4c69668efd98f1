//! Active telemetry session.
//!
//! One session is active at a time. Its id is derived from the creation
//! instant in microseconds, bumped past the last issued value so that two
//! sessions never share an id even when created within the same tick.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use tracing::info;

/// A logical grouping of consecutive captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

/// Owns the active session. Shared behind an `Arc` by whoever captures.
#[derive(Debug, Default)]
pub struct SessionManager {
    active: RwLock<Option<Session>>,
    last_stamp: AtomicI64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active session, created on first use.
    pub async fn current(&self) -> Session {
        if let Some(ref session) = *self.active.read().await {
            return session.clone();
        }

        let mut active = self.active.write().await;
        // Another caller may have initialized it while we waited.
        if let Some(ref session) = *active {
            return session.clone();
        }
        let session = self.issue();
        info!(session_id = %session.session_id, "Started telemetry session");
        *active = Some(session.clone());
        session
    }

    /// Replace the active session with a new one. Stored snapshots are left
    /// untouched.
    pub async fn start_fresh(&self) -> Session {
        let session = self.issue();
        *self.active.write().await = Some(session.clone());
        info!(session_id = %session.session_id, "Started fresh telemetry session");
        session
    }

    fn issue(&self) -> Session {
        let now = Utc::now().timestamp_micros();
        let next = |last: i64| now.max(last + 1);
        // The closure always returns Some, so this is always Ok.
        let previous = match self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(next(last)))
        {
            Ok(prev) | Err(prev) => prev,
        };
        let stamp = next(previous);

        Session {
            session_id: format!("session-{stamp}"),
            created_at: DateTime::from_timestamp_micros(stamp).unwrap_or_else(Utc::now),
        }
    }
}
