//! Narrow text command channel to the target device.
//!
//! Everything the server learns about the device goes through a
//! [`DeviceChannel`]: one command in, raw stdout/stderr out. The channel is
//! slow and serial, so callers treat every round-trip as expensive.

pub mod adb;

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub use adb::AdbChannel;

/// Raw result of one command executed on the device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful command with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A command that exited non-zero.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Transport-level failure. Ordinary command failure is not an error: it is
/// reported as `CommandOutput { succeeded: false, .. }`.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The transport is absent (binary missing, no device attached).
    #[error("device channel unavailable: {0}")]
    Unavailable(String),
    /// The command did not finish within the channel timeout.
    #[error("device command timed out after {0:?}")]
    Timeout(Duration),
    #[error("device channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Executes one command against the device.
#[async_trait]
pub trait DeviceChannel: Send + Sync {
    async fn execute(&self, args: &[&str]) -> Result<CommandOutput, ChannelError>;
}

/// Run a command and return its stdout only if it succeeded.
///
/// Transport errors and non-zero exits both collapse to `None`; callers that
/// need the distinction use [`DeviceChannel::execute`] directly.
pub async fn stdout_of(channel: &dyn DeviceChannel, args: &[&str]) -> Option<String> {
    match channel.execute(args).await {
        Ok(out) if out.succeeded => Some(out.stdout),
        Ok(out) => {
            debug!(?args, stderr = %out.stderr.trim(), "device command failed");
            None
        }
        Err(e) => {
            debug!(?args, "device channel error: {e}");
            None
        }
    }
}
