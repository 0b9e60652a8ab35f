use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::executor::channel::{args, DeviceCommandChannel};
use crate::perception::types::Frame;

/// Source of full-resolution device frames.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture(&self) -> PilotResult<Frame>;
}

/// `screencap` on the device, `pull` to a local temp file, then decode.
///
/// Every capture uses its own remote and local file names, so a monitor can
/// capture concurrently with the agent loop.
pub struct AdbScreenCapture {
    channel: Arc<dyn DeviceCommandChannel>,
    local_dir: PathBuf,
}

impl AdbScreenCapture {
    pub fn new(channel: Arc<dyn DeviceCommandChannel>) -> Self {
        Self {
            channel,
            local_dir: std::env::temp_dir(),
        }
    }

    pub fn with_local_dir(mut self, dir: PathBuf) -> Self {
        self.local_dir = dir;
        self
    }
}

#[async_trait]
impl ScreenCapture for AdbScreenCapture {
    async fn capture(&self) -> PilotResult<Frame> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let remote = format!("/sdcard/phonepilot_{id}.png");
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let local = self.local_dir.join(format!("screen_{timestamp}_{}.png", &id[..8]));
        let local_str = local.to_string_lossy().to_string();

        self.channel
            .run(&args(["shell", "screencap", "-p", remote.as_str()]))
            .await?;
        let pulled = self.channel.run(&args(["pull", remote.as_str(), local_str.as_str()])).await;
        if let Err(e) = self.channel.run(&args(["shell", "rm", remote.as_str()])).await {
            tracing::warn!(error = %e, remote = %remote, "failed to remove remote screenshot");
        }
        pulled?;

        let bytes = tokio::fs::read(&local).await?;
        let _ = tokio::fs::remove_file(&local).await;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| PilotError::Perception(format!("screenshot decode: {e}")))?;

        tracing::debug!(width = image.width(), height = image.height(), "screenshot captured");
        Ok(Frame::new(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::fake::RecordingChannel;

    #[tokio::test]
    async fn captures_pulls_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let channel = Arc::new(RecordingChannel::new(108, 234));
        let capture = AdbScreenCapture::new(channel.clone()).with_local_dir(dir.path().to_path_buf());

        let frame = capture.capture().await.unwrap();
        assert_eq!((frame.width(), frame.height()), (108, 234));

        let calls = channel.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(&calls[0][..3], &args(["shell", "screencap", "-p"])[..]);
        assert_eq!(calls[1][0], "pull");
        assert_eq!(calls[1][1], calls[0][3]);
        assert_eq!(calls[2], args(["shell", "rm", calls[0][3].as_str()]));
        assert!(channel.input_commands().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn remote_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let channel = Arc::new(RecordingChannel::new(10, 10));
        let capture = AdbScreenCapture::new(channel.clone()).with_local_dir(dir.path().to_path_buf());
        capture.capture().await.unwrap();
        capture.capture().await.unwrap();
        let calls = channel.calls();
        assert_ne!(calls[0][3], calls[3][3]);
    }

    #[tokio::test]
    async fn unreachable_device_propagates() {
        let channel = Arc::new(RecordingChannel::new(10, 10));
        channel.disconnect();
        let err = AdbScreenCapture::new(channel).capture().await.unwrap_err();
        assert!(matches!(err, PilotError::DeviceUnavailable(_)));
    }
}
