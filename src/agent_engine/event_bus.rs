use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::agent_engine::action::DeviceAction;
use crate::agent_engine::state::AgentState;
use crate::llm::types::StreamChunk;

/// Progress notifications for observers (CLI printer, viewers, tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentMessage {
    StateChanged {
        state: AgentState,
    },
    FrameCaptured {
        step: u32,
        width: u32,
        height: u32,
        sent_width: u32,
        sent_height: u32,
    },
    InferenceChunk(StreamChunk),
    InferenceOutput {
        step: u32,
        output: serde_json::Value,
    },
    ActionDispatched {
        step: u32,
        action: DeviceAction,
    },
}

/// Commands flowing into the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Stop,
}

pub struct EventBus {
    tx: broadcast::Sender<AgentMessage>,
    command_tx: mpsc::Sender<ControlCommand>,
    command_rx: mpsc::Receiver<ControlCommand>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        let (command_tx, command_rx) = mpsc::channel(8);
        Self {
            tx,
            command_tx,
            command_rx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentMessage> {
        self.tx.subscribe()
    }

    /// Fire-and-forget; having no subscribers is fine.
    pub fn publish(&self, msg: AgentMessage) {
        let _ = self.tx.send(msg);
    }

    pub fn command_sender(&self) -> mpsc::Sender<ControlCommand> {
        self.command_tx.clone()
    }

    /// True when a stop was requested since the last call.
    pub fn stop_requested(&mut self) -> bool {
        let mut stop = false;
        while let Ok(cmd) = self.command_rx.try_recv() {
            if cmd == ControlCommand::Stop {
                stop = true;
            }
        }
        stop
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_messages() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(AgentMessage::StateChanged { state: AgentState::Idle });
        match rx.recv().await.unwrap() {
            AgentMessage::StateChanged { state } => assert_eq!(state, AgentState::Idle),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_is_seen_once() {
        let mut bus = EventBus::new();
        assert!(!bus.stop_requested());
        bus.command_sender().send(ControlCommand::Stop).await.unwrap();
        assert!(bus.stop_requested());
        assert!(!bus.stop_requested());
    }
}
