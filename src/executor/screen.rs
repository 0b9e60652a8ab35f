use std::sync::{Arc, Mutex};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};
use crate::executor::channel::{args, DeviceCommandChannel};

/// Native device resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Parses `wm size` output. An `Override size:` line wins over `Physical size:`
/// because input events are delivered in the overridden coordinate space.
pub fn parse_wm_size(output: &str) -> PilotResult<ScreenSize> {
    let re = Regex::new(r"(?m)^\s*(Physical|Override) size:\s*(\d+)x(\d+)")
        .map_err(|e| PilotError::ScreenQuery(e.to_string()))?;

    let mut physical = None;
    let mut overridden = None;
    for cap in re.captures_iter(output) {
        let size = ScreenSize::new(
            cap[2].parse().map_err(|_| PilotError::ScreenQuery(output.to_string()))?,
            cap[3].parse().map_err(|_| PilotError::ScreenQuery(output.to_string()))?,
        );
        match &cap[1] {
            "Override" => overridden = Some(size),
            _ => physical = Some(size),
        }
    }

    match overridden.or(physical) {
        Some(size) if size.width > 0 && size.height > 0 => Ok(size),
        _ => Err(PilotError::ScreenQuery(format!(
            "unrecognised wm size output: {output:?}"
        ))),
    }
}

/// Runs `wm size` on the device.
pub async fn query_screen_size(channel: &dyn DeviceCommandChannel) -> PilotResult<ScreenSize> {
    let output = match channel.run(&args(["shell", "wm", "size"])).await {
        Ok(out) => out,
        Err(PilotError::CommandFailure { stderr }) => return Err(PilotError::ScreenQuery(stderr)),
        Err(e) => return Err(e),
    };
    parse_wm_size(&output)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePolicy {
    /// Query the device before every mapping.
    QueryEachTime,
    /// Query once and reuse until a frame reports different dimensions.
    CacheUntilMismatch,
}

/// Where the coordinate mapper gets the current screen size from.
pub struct ScreenSizeSource {
    channel: Arc<dyn DeviceCommandChannel>,
    policy: SizePolicy,
    cached: Mutex<Option<ScreenSize>>,
}

impl ScreenSizeSource {
    pub fn new(channel: Arc<dyn DeviceCommandChannel>, policy: SizePolicy) -> Self {
        Self {
            channel,
            policy,
            cached: Mutex::new(None),
        }
    }

    pub async fn current(&self) -> PilotResult<ScreenSize> {
        if self.policy == SizePolicy::CacheUntilMismatch {
            if let Some(size) = *self.lock() {
                return Ok(size);
            }
        }

        let size = query_screen_size(self.channel.as_ref()).await?;
        tracing::debug!(width = size.width, height = size.height, "screen size queried");
        if self.policy == SizePolicy::CacheUntilMismatch {
            *self.lock() = Some(size);
        }
        Ok(size)
    }

    /// Drops the cached size when a captured frame disagrees with it.
    pub fn observe_frame(&self, width: u32, height: u32) {
        let mut cached = self.lock();
        if let Some(size) = *cached {
            if size != ScreenSize::new(width, height) {
                tracing::info!(
                    cached = %format!("{}x{}", size.width, size.height),
                    frame = %format!("{width}x{height}"),
                    "frame dimensions changed; screen size cache invalidated"
                );
                *cached = None;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ScreenSize>> {
        self.cached.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
