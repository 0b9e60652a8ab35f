use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::agent_engine::event_bus::{AgentMessage, ControlCommand, EventBus};
use crate::agent_engine::history::{ConversationHistory, ExecutionRecord, SessionHistory};
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::state::{AbortReason, AgentState, LoopConfig};
use crate::errors::{PilotError, PilotResult};
use crate::executor::dispatcher::ActionTranslator;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage};
use crate::perception::pipeline;
use crate::perception::screenshot::ScreenCapture;

enum StepOutcome {
    Continue,
    Completed,
}

/// Perceive → infer → act loop for one instruction.
///
/// Owns the conversation and the execution records. Every device command of a
/// step completes before the next step's screenshot is taken.
pub struct AgentEngine {
    state: AgentState,
    config: LoopConfig,
    loop_ctrl: LoopController,
    capture: Arc<dyn ScreenCapture>,
    translator: ActionTranslator,
    provider: Arc<dyn LlmProvider>,
    call_config: CallConfig,
    system_prompt: String,
    conversation: ConversationHistory,
    history: SessionHistory,
    /// Index of the first record produced by the current `run`.
    run_start: usize,
    bus: EventBus,
}

impl AgentEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: LoopConfig,
        capture: Arc<dyn ScreenCapture>,
        translator: ActionTranslator,
        provider: Arc<dyn LlmProvider>,
        call_config: CallConfig,
        system_prompt: String,
        history: SessionHistory,
        bus: EventBus,
    ) -> Self {
        Self {
            state: AgentState::Idle,
            loop_ctrl: LoopController::new(config.max_steps),
            config,
            capture,
            translator,
            provider,
            call_config,
            system_prompt,
            conversation: ConversationHistory::new(),
            history,
            run_start: 0,
            bus,
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        self.history.records()
    }

    pub fn conversation(&self) -> &ConversationHistory {
        &self.conversation
    }

    pub fn session_id(&self) -> &str {
        &self.history.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentMessage> {
        self.bus.subscribe()
    }

    /// Sender for stop requests; honored at the next step boundary.
    pub fn stop_handle(&self) -> mpsc::Sender<ControlCommand> {
        self.bus.command_sender()
    }

    /// Runs until completion, the step limit, cancellation or a fatal error.
    pub async fn run(&mut self, instruction: &str) -> AgentState {
        tracing::info!(
            instruction = %instruction,
            max_steps = self.config.max_steps,
            provider = %self.provider.name(),
            session = %self.history.session_id,
            "task started"
        );
        self.conversation.clear();
        self.run_start = self.history.records().len();
        self.loop_ctrl = LoopController::new(self.config.max_steps);

        let final_state = loop {
            if self.bus.stop_requested() {
                tracing::info!("stop requested");
                break AgentState::Aborted { reason: AbortReason::Cancelled };
            }
            if self.loop_ctrl.should_stop() {
                tracing::info!(steps = self.loop_ctrl.current_step(), "step limit reached");
                break AgentState::Aborted { reason: AbortReason::StepLimitExceeded };
            }

            let step = self.loop_ctrl.current_step();
            tracing::info!(step = step + 1, max = self.loop_ctrl.max_steps(), "step");

            match self.step(step, instruction).await {
                Ok(StepOutcome::Continue) => self.loop_ctrl.record_step(),
                Ok(StepOutcome::Completed) => {
                    self.loop_ctrl.record_step();
                    break AgentState::Completed { steps: self.loop_ctrl.current_step() };
                }
                Err(e) if !e.is_fatal() => {
                    tracing::warn!(step, error = %e, "step skipped");
                    self.loop_ctrl.record_step();
                }
                Err(e) => {
                    tracing::error!(step, error = %e, "step failed; aborting");
                    break AgentState::Aborted { reason: AbortReason::Error(e.to_string()) };
                }
            }
        };

        self.set_state(final_state.clone());
        tracing::info!(
            session = %self.history.session_id,
            steps = self.loop_ctrl.current_step(),
            state = ?final_state,
            "task ended"
        );
        final_state
    }

    async fn step(&mut self, step: u32, instruction: &str) -> PilotResult<StepOutcome> {
        // ── Perceive ──────────────────────────────────────────────────────
        self.set_state(AgentState::Perceiving { step });
        let frame = self.capture.capture().await?;
        self.translator
            .mapper()
            .source()
            .observe_frame(frame.width(), frame.height());
        let prepared = pipeline::prepare(&frame)?;
        self.bus.publish(AgentMessage::FrameCaptured {
            step,
            width: frame.width(),
            height: frame.height(),
            sent_width: prepared.width,
            sent_height: prepared.height,
        });

        if let Some(previous) = self.history.records()[self.run_start..].last() {
            self.conversation.push_assistant(previous);
        }
        self.conversation.push_user(instruction, &prepared.data_url);

        // ── Infer ─────────────────────────────────────────────────────────
        self.set_state(AgentState::Inferring { step });
        let mut messages = Vec::with_capacity(self.conversation.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(self.conversation.turns().iter().cloned());

        let timeout = self.config.inference_timeout;
        let response = tokio::time::timeout(
            timeout,
            self.provider.chat(messages, &self.call_config, &self.bus),
        )
        .await
        .map_err(|_| PilotError::InferenceTimeout(timeout.as_secs()))??;

        let record = ExecutionRecord::from_raw(step, response.content);
        if let Some(err) = &record.error {
            tracing::warn!(step, error = %err, raw = %record.raw_output, "unusable model output");
        } else {
            tracing::info!(step, output = %record.assistant_content(), "model output");
        }
        self.bus.publish(AgentMessage::InferenceOutput {
            step,
            output: record.output.clone(),
        });

        let completed = record.task_completed();
        let action = record.action.clone();
        self.history.push(record);
        if let Err(e) = self.history.flush() {
            tracing::warn!(error = %e, "session log write failed");
        }

        // ── Act ───────────────────────────────────────────────────────────
        match action {
            Some(action) => {
                self.set_state(AgentState::Acting { step });
                self.bus.publish(AgentMessage::ActionDispatched {
                    step,
                    action: action.clone(),
                });
                self.translator.execute(&action).await?;
            }
            None if !completed => {
                tracing::warn!(step, "no actionable field in model output");
            }
            None => {}
        }

        if completed {
            tracing::info!(step, "task reported complete");
            return Ok(StepOutcome::Completed);
        }

        tokio::time::sleep(self.config.settle_delay).await;
        Ok(StepOutcome::Continue)
    }

    fn set_state(&mut self, state: AgentState) {
        tracing::debug!(?state, "state");
        self.state = state.clone();
        self.bus.publish(AgentMessage::StateChanged { state });
    }
}
