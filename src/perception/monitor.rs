// Read-only screen monitor for external viewers.
//
// Polls a ScreenCapture on a fixed interval and publishes the newest frame.
// It has no access to the action translator and never injects input.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::perception::screenshot::ScreenCapture;
use crate::perception::types::Frame;

pub struct FrameMonitor {
    frames: watch::Receiver<Option<Arc<Frame>>>,
    task: JoinHandle<()>,
}

impl FrameMonitor {
    /// Starts polling. When `output` is set, each frame is also written there as PNG.
    pub fn spawn(
        capture: Arc<dyn ScreenCapture>,
        interval: Duration,
        output: Option<PathBuf>,
    ) -> Self {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let frame = match capture.capture().await {
                    Ok(frame) => Arc::new(frame),
                    Err(e) => {
                        tracing::warn!(error = %e, "monitor capture failed");
                        continue;
                    }
                };

                if let Some(path) = output.clone() {
                    let to_save = frame.clone();
                    let saved =
                        tokio::task::spawn_blocking(move || to_save.image.save(&path)).await;
                    match saved {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => tracing::warn!(error = %e, "monitor frame save failed"),
                        Err(e) => tracing::warn!(error = %e, "monitor save task panicked"),
                    }
                }

                if tx.send(Some(frame)).is_err() {
                    tracing::debug!("monitor has no subscribers left");
                    break;
                }
            }
        });
        tracing::info!(interval_ms = interval.as_millis() as u64, "frame monitor started");
        Self { frames: rx, task }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Frame>>> {
        self.frames.clone()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}
