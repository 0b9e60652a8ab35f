use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle states of the agent loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Perceiving { step: u32 },
    Inferring { step: u32 },
    Acting { step: u32 },
    Completed { steps: u32 },
    Aborted { reason: AbortReason },
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Completed { .. } | AgentState::Aborted { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AbortReason {
    /// Step budget used up without completion. Not an error.
    StepLimitExceeded,
    Cancelled,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_steps: u32,
    /// Pause after each dispatched action so the UI can update.
    pub settle_delay: Duration,
    pub inference_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            settle_delay: Duration::from_secs(1),
            inference_timeout: Duration::from_secs(120),
        }
    }
}

impl From<&crate::config::AgentConfig> for LoopConfig {
    fn from(cfg: &crate::config::AgentConfig) -> Self {
        Self {
            max_steps: cfg.max_steps,
            settle_delay: Duration::from_millis(cfg.settle_delay_ms),
            inference_timeout: Duration::from_secs(cfg.inference_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(AgentState::Completed { steps: 2 }.is_terminal());
        assert!(AgentState::Aborted { reason: AbortReason::StepLimitExceeded }.is_terminal());
        assert!(!AgentState::Acting { step: 0 }.is_terminal());
        assert!(!AgentState::Idle.is_terminal());
    }

    #[test]
    fn serializes_with_tags() {
        let json = serde_json::to_value(AgentState::Aborted {
            reason: AbortReason::Error("device offline".into()),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"state": "aborted", "reason": {"kind": "error", "detail": "device offline"}})
        );
    }
}
