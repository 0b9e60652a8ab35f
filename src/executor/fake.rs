//! In-memory device used by unit tests.
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::executor::channel::DeviceCommandChannel;

/// Records every command and answers `wm size`, `screencap` and `pull`.
pub struct RecordingChannel {
    calls: Mutex<Vec<Vec<String>>>,
    screen: Mutex<(u32, u32)>,
    rejected: Mutex<Vec<String>>,
    unavailable: Mutex<bool>,
}

impl RecordingChannel {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            screen: Mutex::new((width, height)),
            rejected: Mutex::new(Vec::new()),
            unavailable: Mutex::new(false),
        }
    }

    pub fn set_screen(&self, width: u32, height: u32) {
        *self.screen.lock().unwrap() = (width, height);
    }

    /// Commands containing `token` fail with `CommandFailure`.
    pub fn reject(&self, token: &str) {
        self.rejected.lock().unwrap().push(token.to_string());
    }

    /// Every later command fails with `DeviceUnavailable`.
    pub fn disconnect(&self) {
        *self.unavailable.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands that inject input (`input ...` or the text broadcast).
    pub fn input_commands(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|c| c.iter().any(|a| a == "input" || a == "broadcast"))
            .collect()
    }

    pub fn count_matching(&self, token: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.iter().any(|a| a == token))
            .count()
    }

    fn png(&self) -> Vec<u8> {
        let (w, h) = *self.screen.lock().unwrap();
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([30, 144, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }
}

#[async_trait]
impl DeviceCommandChannel for RecordingChannel {
    async fn run(&self, args: &[String]) -> PilotResult<String> {
        self.calls.lock().unwrap().push(args.to_vec());

        if *self.unavailable.lock().unwrap() {
            return Err(PilotError::DeviceUnavailable("no devices/emulators found".into()));
        }
        let rejected = self.rejected.lock().unwrap().clone();
        if rejected.iter().any(|t| args.iter().any(|a| a == t)) {
            return Err(PilotError::CommandFailure {
                stderr: format!("rejected: {}", args.join(" ")),
            });
        }

        match args.first().map(String::as_str) {
            Some("shell") if args.get(1).map(String::as_str) == Some("wm") => {
                let (w, h) = *self.screen.lock().unwrap();
                Ok(format!("Physical size: {w}x{h}"))
            }
            Some("pull") => {
                let local = &args[2];
                std::fs::write(local, self.png())?;
                Ok(format!("{}: 1 file pulled", args[1]))
            }
            _ => Ok(String::new()),
        }
    }
}
