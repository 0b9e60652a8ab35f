use std::sync::Arc;
use std::time::Duration;

use crate::agent_engine::action::DeviceAction;
use crate::errors::PilotResult;
use crate::executor::channel::DeviceCommandChannel;
use crate::executor::coordinator::CoordinateMapper;
use crate::executor::keys::keycode_for;
use crate::executor::text_input::{decode_if_percent_encoded, shell_quote};

/// Turns resolved actions into `adb shell input` / broadcast commands.
///
/// Commands are issued one at a time and awaited before the next is sent.
pub struct ActionTranslator {
    channel: Arc<dyn DeviceCommandChannel>,
    mapper: CoordinateMapper,
    text_settle: Duration,
}

impl ActionTranslator {
    pub fn new(
        channel: Arc<dyn DeviceCommandChannel>,
        mapper: CoordinateMapper,
        text_settle: Duration,
    ) -> Self {
        Self {
            channel,
            mapper,
            text_settle,
        }
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub async fn execute(&self, action: &DeviceAction) -> PilotResult<()> {
        match action {
            DeviceAction::Tap { point } => {
                let (x, y) = self.mapper.map(*point).await?;
                tracing::info!(x, y, "tap");
                self.shell(&["input", "tap", &x.to_string(), &y.to_string()]).await
            }

            // No long-press primitive exists: a swipe that starts and ends on
            // the same pixel holds the finger down for `duration_ms`.
            DeviceAction::LongPress { point, duration_ms } => {
                let (x, y) = self.mapper.map(*point).await?;
                tracing::info!(x, y, duration_ms, "long press");
                self.swipe((x, y), (x, y), *duration_ms).await
            }

            DeviceAction::SwipeDirectional { point, direction, duration_ms } => {
                let (x, y) = self.mapper.map(*point).await?;
                let (dx, dy) = direction.offset();
                tracing::info!(x, y, ?direction, duration_ms, "directional swipe");
                self.swipe((x, y), (x + dx, y + dy), *duration_ms).await
            }

            DeviceAction::SwipeToPoint { point, target, duration_ms } => {
                let from = self.mapper.map(*point).await?;
                let to = self.mapper.map(*target).await?;
                tracing::info!(from = ?from, to = ?to, duration_ms, "swipe to point");
                self.swipe(from, to, *duration_ms).await
            }

            DeviceAction::KeyPress { key } => {
                let code = keycode_for(key);
                tracing::info!(key = %key, keycode = code, "key press");
                self.shell(&["input", "keyevent", code]).await
            }

            DeviceAction::TextInput { text } => {
                let text = decode_if_percent_encoded(text);
                tracing::info!(chars = text.chars().count(), "text input");
                self.shell(&[
                    "am",
                    "broadcast",
                    "-a",
                    "ADB_INPUT_TEXT",
                    "--es",
                    "msg",
                    &shell_quote(&text),
                ])
                .await?;
                tokio::time::sleep(self.text_settle).await;
                Ok(())
            }

            DeviceAction::Wait { duration_ms } => {
                tracing::info!(duration_ms, "wait");
                tokio::time::sleep(Duration::from_millis(*duration_ms)).await;
                Ok(())
            }
        }
    }

    async fn swipe(&self, from: (i32, i32), to: (i32, i32), duration_ms: u64) -> PilotResult<()> {
        self.shell(&[
            "input",
            "swipe",
            &from.0.to_string(),
            &from.1.to_string(),
            &to.0.to_string(),
            &to.1.to_string(),
            &duration_ms.to_string(),
        ])
        .await
    }

    async fn shell(&self, cmd: &[&str]) -> PilotResult<()> {
        let mut full = Vec::with_capacity(cmd.len() + 1);
        full.push("shell".to_string());
        full.extend(cmd.iter().map(|s| s.to_string()));
        self.channel.run(&full).await.map(|_| ())
    }
}
