use async_trait::async_trait;

use crate::errors::PilotResult;

/// Command execution against the attached device.
///
/// Implementations run exactly one command per call and return its stdout.
/// Errors are `DeviceUnavailable` when nothing is reachable and
/// `CommandFailure` when the device rejected the command.
#[async_trait]
pub trait DeviceCommandChannel: Send + Sync {
    async fn run(&self, args: &[String]) -> PilotResult<String>;
}

/// Builds an owned argument vector from string slices.
pub fn args<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}
