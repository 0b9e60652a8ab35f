use std::time::Duration;

use async_trait::async_trait;

use crate::config::DeviceConfig;
use crate::errors::{PilotError, PilotResult};
use crate::executor::channel::DeviceCommandChannel;

/// stderr fragments adb prints when no device is reachable. A bare
/// "not found" is left out: the device shell prints it for unknown commands.
const UNAVAILABLE_MARKERS: [&str; 5] = [
    "no devices/emulators found",
    "device offline",
    "unauthorized",
    "cannot connect",
    "daemon not running",
];

/// `adb` subprocess per command.
pub struct AdbChannel {
    adb_path: String,
    serial: Option<String>,
    timeout: Duration,
}

impl AdbChannel {
    pub fn new(cfg: &DeviceConfig) -> Self {
        Self {
            adb_path: cfg.adb_path.clone(),
            serial: cfg.serial.clone(),
            timeout: Duration::from_secs(cfg.command_timeout_secs),
        }
    }

    /// Create the channel and check that a usable device is attached.
    pub async fn connect(cfg: &DeviceConfig) -> PilotResult<Self> {
        let channel = Self::new(cfg);
        let listing = channel.exec(&["devices".to_string()], false).await?;
        let devices = parse_devices(&listing);
        let ready: Vec<&(String, String)> =
            devices.iter().filter(|(_, state)| state == "device").collect();

        match &channel.serial {
            Some(serial) if !ready.iter().any(|(s, _)| s == serial) => {
                return Err(PilotError::DeviceUnavailable(format!(
                    "device '{serial}' is not attached or not ready"
                )));
            }
            None if ready.is_empty() => {
                return Err(PilotError::DeviceUnavailable(
                    "no device in 'device' state; check USB debugging".into(),
                ));
            }
            _ => {}
        }

        tracing::info!(
            devices = ready.len(),
            serial = channel.serial.as_deref().unwrap_or("<default>"),
            "adb connected"
        );
        Ok(channel)
    }

    async fn exec(&self, args: &[String], targeted: bool) -> PilotResult<String> {
        let mut cmd = tokio::process::Command::new(&self.adb_path);
        if targeted {
            if let Some(serial) = &self.serial {
                cmd.arg("-s").arg(serial);
            }
        }
        cmd.args(args).kill_on_drop(true);

        tracing::trace!(args = ?args, "adb");
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(PilotError::DeviceUnavailable(format!(
                    "failed to execute {}: {e}",
                    self.adb_path
                )))
            }
            Err(_) => {
                return Err(PilotError::DeviceUnavailable(format!(
                    "adb {} timed out after {}s",
                    args.join(" "),
                    self.timeout.as_secs()
                )))
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(classify_failure(stderr))
        }
    }
}

#[async_trait]
impl DeviceCommandChannel for AdbChannel {
    async fn run(&self, args: &[String]) -> PilotResult<String> {
        self.exec(args, true).await
    }
}

fn classify_failure(stderr: String) -> PilotError {
    let lower = stderr.to_lowercase();
    let missing_device = lower.contains("device '") && lower.contains("' not found");
    if missing_device || UNAVAILABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        PilotError::DeviceUnavailable(stderr)
    } else {
        PilotError::CommandFailure { stderr }
    }
}

/// Parses `adb devices` output into `(serial, state)` pairs.
pub fn parse_devices(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of devices") && !l.starts_with('*'))
        .filter_map(|l| {
            let mut parts = l.split_whitespace();
            Some((parts.next()?.to_string(), parts.next()?.to_string()))
        })
        .collect()
}
