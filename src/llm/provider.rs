use async_trait::async_trait;

use crate::agent_engine::event_bus::EventBus;
use crate::errors::PilotResult;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};

/// Chat-completion backend used as the agent's inference service.
/// Each call returns exactly one response; retries are the caller's concern.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider's identifier (matches config.toml key).
    fn name(&self) -> &str;

    /// Runs one completion. Streaming providers forward chunks to `bus` as they arrive.
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        cfg: &CallConfig,
        bus: &EventBus,
    ) -> PilotResult<LlmResponse>;
}
