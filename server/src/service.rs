//! The operations exposed to the request layer.
//!
//! Composes the device channel, name resolution, session and telemetry
//! store. Apart from input validation and package listing, nothing here
//! fails: degraded data is returned instead.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::channel::{ChannelError, DeviceChannel};
use crate::config::{AppConfig, ResolverConfig};
use crate::packages::scheduler::ResolvedMap;
use crate::packages::{self, resolver, BatchScheduler, NameResolver, PackageFilter, ResolvedName};
use crate::session::SessionManager;
use crate::telemetry::{self, SessionSummary, SnapshotId, TelemetrySnapshot, TelemetryStore};

/// Largest history window a caller may request.
pub const MAX_HISTORY_LIMIT: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The request itself is unusable.
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Result of a telemetry capture.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureResult {
    pub snapshot_id: SnapshotId,
    pub current: TelemetrySnapshot,
    /// The session's history including `current`, oldest first.
    pub history: Vec<TelemetrySnapshot>,
}

/// Result of switching to a fresh session.
#[derive(Debug, Clone, Serialize)]
pub struct FreshSession {
    pub session_id: String,
    pub cleared_count: u64,
}

/// Entry point for everything the API does with the device.
pub struct DeviceService {
    channel: Arc<dyn DeviceChannel>,
    scheduler: BatchScheduler,
    sessions: Arc<SessionManager>,
    store: Arc<TelemetryStore>,
    resolver_config: ResolverConfig,
    history_limit: usize,
}

impl DeviceService {
    pub fn new(
        channel: Arc<dyn DeviceChannel>,
        store: Arc<TelemetryStore>,
        sessions: Arc<SessionManager>,
        config: &AppConfig,
    ) -> Self {
        let scheduler = BatchScheduler::new(NameResolver::new(channel.clone()));
        Self {
            channel,
            scheduler,
            sessions,
            store,
            resolver_config: config.resolver.clone(),
            history_limit: config.telemetry.history_limit,
        }
    }

    /// Resolve display names for `ids`, keyed by the ids as given.
    ///
    /// Blank ids and ids with surrounding whitespace are rejected. If the
    /// batch runs past its deadline, names resolved so far are kept and only
    /// the remaining ids get synthesized names.
    pub async fn resolve_packages(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, ResolvedName>, ServiceError> {
        if ids.is_empty() {
            return Err(ServiceError::InvalidInput(
                "at least one package id is required".to_string(),
            ));
        }
        let malformed = |id: &&String| id.is_empty() || id.trim() != id.as_str();
        if let Some(bad) = ids.iter().find(malformed) {
            return Err(ServiceError::InvalidInput(format!(
                "invalid package id {bad:?}: must be non-blank without surrounding whitespace"
            )));
        }

        let config = &self.resolver_config;
        let resolved = ResolvedMap::default();
        let batch = self
            .scheduler
            .resolve_into(ids, config.concurrency, config.pacing(), &resolved);

        if tokio::time::timeout(config.batch_timeout(), batch).await.is_err() {
            let done = resolved.lock().await.len();
            warn!(
                count = ids.len(),
                done,
                timeout_secs = config.batch_timeout_secs,
                "Batch resolution timed out, synthesizing remaining names"
            );
        }

        let mut resolved = std::mem::take(&mut *resolved.lock().await);
        for id in ids {
            resolved
                .entry(id.clone())
                .or_insert_with(|| resolver::fallback_name(id));
        }
        info!(count = resolved.len(), "Resolved package names");
        Ok(resolved)
    }

    /// Installed package identifiers matching `filter`.
    pub async fn list_packages(&self, filter: PackageFilter) -> Result<Vec<String>, ServiceError> {
        Ok(packages::list_packages(self.channel.as_ref(), filter).await?)
    }

    /// List installed packages and resolve all of them.
    pub async fn resolve_installed(
        &self,
        filter: PackageFilter,
    ) -> Result<HashMap<String, ResolvedName>, ServiceError> {
        let ids = self.list_packages(filter).await?;
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.resolve_packages(&ids).await
    }

    /// Capture battery and memory, store the snapshot in the active session
    /// and return it with the session's recent history.
    pub async fn capture_snapshot(&self) -> CaptureResult {
        let session = self.sessions.current().await;
        let current = telemetry::capture(self.channel.as_ref(), &session.session_id).await;
        if current.is_partial() {
            warn!(
                battery = ?current.battery_level_percent,
                memory_mb = ?current.memory_used_mb,
                "Partial telemetry snapshot"
            );
        }

        let snapshot_id = self.store.append(&current).await;
        let history = self
            .store
            .history(&session.session_id, self.history_limit)
            .await;

        CaptureResult {
            snapshot_id,
            current,
            history,
        }
    }

    /// Switch to a new session, optionally clearing all stored telemetry.
    pub async fn start_fresh_session(&self, clear: bool) -> FreshSession {
        let cleared_count = if clear { self.store.clear().await } else { 0 };
        let session = self.sessions.start_fresh().await;
        FreshSession {
            session_id: session.session_id,
            cleared_count,
        }
    }

    /// History of `session_id`, or of the active session when absent.
    pub async fn history(
        &self,
        limit: Option<usize>,
        session_id: Option<&str>,
    ) -> Result<Vec<TelemetrySnapshot>, ServiceError> {
        let limit = limit.unwrap_or(self.history_limit);
        if limit == 0 || limit > MAX_HISTORY_LIMIT {
            return Err(ServiceError::InvalidInput(format!(
                "limit must be between 1 and {MAX_HISTORY_LIMIT}"
            )));
        }

        let session_id = match session_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.sessions.current().await.session_id,
        };
        Ok(self.store.history(&session_id, limit).await)
    }

    /// Stored sessions, most recent first.
    pub async fn sessions(&self) -> Vec<SessionSummary> {
        self.store.sessions().await
    }

    /// Remove all telemetry of every session.
    pub async fn clear_all(&self) -> u64 {
        let cleared = self.store.clear().await;
        info!(cleared, "Cleared all telemetry");
        cleared
    }
}
