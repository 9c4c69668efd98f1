//! `adb`-backed device channel.
//!
//! Shells out to the `adb` binary for every command. The link to a device is
//! a single serial resource, so only one command is in flight at a time.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

use super::{ChannelError, CommandOutput, DeviceChannel};
use crate::config::DeviceConfig;

/// Runs commands through the local `adb` binary.
#[derive(Debug)]
pub struct AdbChannel {
    adb_path: PathBuf,
    serial: Option<String>,
    timeout: Duration,
    link: Mutex<()>,
}

impl AdbChannel {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            adb_path: PathBuf::from(&config.adb_path),
            serial: config.serial.clone(),
            timeout: Duration::from_secs(config.command_timeout_secs),
            link: Mutex::new(()),
        }
    }

    /// Full argument vector passed to `adb`, including the device selector.
    fn argv<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        if let Some(ref serial) = self.serial {
            argv.push("-s");
            argv.push(serial.as_str());
        }
        argv.extend_from_slice(args);
        argv
    }
}

#[async_trait]
impl DeviceChannel for AdbChannel {
    async fn execute(&self, args: &[&str]) -> Result<CommandOutput, ChannelError> {
        let argv = self.argv(args);
        let _link = self.link.lock().await;

        debug!(?argv, "adb");
        let mut command = Command::new(&self.adb_path);
        command.args(&argv).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ChannelError::Unavailable(format!(
                    "adb binary not found at {}",
                    self.adb_path.display()
                )));
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ChannelError::Timeout(self.timeout)),
        };

        Ok(CommandOutput {
            succeeded: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(serial: Option<&str>, adb_path: &str) -> DeviceConfig {
        DeviceConfig {
            adb_path: adb_path.to_string(),
            serial: serial.map(str::to_string),
            command_timeout_secs: 5,
        }
    }

    #[test]
    fn test_argv_with_serial() {
        let channel = AdbChannel::new(&config(Some("emulator-5554"), "adb"));
        assert_eq!(
            channel.argv(&["shell", "dumpsys", "battery"]),
            vec!["-s", "emulator-5554", "shell", "dumpsys", "battery"]
        );
    }

    #[test]
    fn test_argv_without_serial() {
        let channel = AdbChannel::new(&config(None, "adb"));
        assert_eq!(channel.argv(&["devices"]), vec!["devices"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let channel = AdbChannel::new(&config(None, "/nonexistent/droidwatch-adb"));
        let err = channel.execute(&["devices"]).await.unwrap_err();
        assert!(matches!(err, ChannelError::Unavailable(_)), "got {err:?}");
    }
}
