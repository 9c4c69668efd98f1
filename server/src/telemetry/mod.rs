//! Device telemetry: capture, parsing, and session-scoped history.

pub mod parser;
pub mod store;
pub mod synthetic;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::{stdout_of, DeviceChannel};

pub use store::{SessionSummary, TelemetryStore};

/// Battery report command.
const BATTERY_COMMAND: &[&str] = &["shell", "dumpsys", "battery"];

/// Memory report commands, tried in order until one parses.
const MEMORY_COMMANDS: &[&[&str]] = &[
    &["shell", "dumpsys", "meminfo"],
    &["shell", "cat", "/proc/meminfo"],
];

/// One point-in-time telemetry reading.
///
/// `None` metrics mean the device read failed or its output didn't parse: a
/// partial snapshot, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub captured_at: DateTime<Utc>,
    pub battery_level_percent: Option<u8>,
    pub memory_used_mb: Option<u64>,
    pub session_id: String,
    /// Generated filler from degraded mode, not a real capture.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

impl TelemetrySnapshot {
    pub fn new(
        session_id: &str,
        captured_at: DateTime<Utc>,
        battery_level_percent: Option<u8>,
        memory_used_mb: Option<u64>,
    ) -> Self {
        Self {
            captured_at,
            battery_level_percent,
            memory_used_mb,
            session_id: session_id.to_string(),
            synthetic: false,
        }
    }

    /// Whether any metric is missing.
    pub fn is_partial(&self) -> bool {
        self.battery_level_percent.is_none() || self.memory_used_mb.is_none()
    }
}

/// Identifier returned for an appended snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SnapshotId {
    /// Row id in the durable store.
    Stored(i64),
    /// Process-local id; the snapshot was not persisted.
    Local(u64),
}

impl SnapshotId {
    pub fn is_persisted(&self) -> bool {
        matches!(self, SnapshotId::Stored(_))
    }
}

/// Read the battery level, or `None` if the read failed.
pub async fn read_battery(channel: &dyn DeviceChannel) -> Option<u8> {
    let text = stdout_of(channel, BATTERY_COMMAND).await?;
    parser::parse_battery(&text)
}

/// Read used memory in MB from the first memory report that parses.
pub async fn read_memory(channel: &dyn DeviceChannel) -> Option<u64> {
    for command in MEMORY_COMMANDS {
        if let Some(used) = stdout_of(channel, command)
            .await
            .and_then(|text| parser::parse_memory(&text))
        {
            return Some(used);
        }
    }
    None
}

/// Issue the diagnostic commands and build a snapshot for `session_id`.
pub async fn capture(channel: &dyn DeviceChannel, session_id: &str) -> TelemetrySnapshot {
    // Storage keeps microseconds.
    let captured_at = Utc::now().trunc_subsecs(6);
    let battery = read_battery(channel).await;
    let memory = read_memory(channel).await;
    TelemetrySnapshot::new(session_id, captured_at, battery, memory)
}
