use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::agent_engine::action::{ActionDescriptor, DeviceAction};
use crate::errors::PilotResult;
use crate::llm::decode;
use crate::llm::types::ChatMessage;

/// One inference result, as parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub step_index: u32,
    /// Decoded JSON, or an error object carrying the raw text.
    pub output: serde_json::Value,
    pub descriptor: Option<ActionDescriptor>,
    /// The executable action, if the descriptor had an actionable field.
    pub action: Option<DeviceAction>,
    pub raw_output: String,
    /// Why the output could not be used, if it could not.
    pub error: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ExecutionRecord {
    /// Decodes raw model text. Never fails: problems land in `error`.
    pub fn from_raw(step_index: u32, raw_output: String) -> Self {
        let mut record = Self {
            step_index,
            output: serde_json::Value::Null,
            descriptor: None,
            action: None,
            raw_output,
            error: None,
            timestamp: chrono::Utc::now(),
        };

        let value = match decode::decode_output(&record.raw_output) {
            Ok(v) => v,
            Err(e) => {
                record.output = decode::error_value(&record.raw_output, &e.to_string());
                record.error = Some(e.to_string());
                return record;
            }
        };
        record.output = value;

        match ActionDescriptor::from_value(&record.output) {
            Ok(descriptor) => {
                match descriptor.resolve() {
                    Ok(action) => record.action = action,
                    Err(e) => record.error = Some(e.to_string()),
                }
                record.descriptor = Some(descriptor);
            }
            Err(e) => record.error = Some(e.to_string()),
        }
        record
    }

    /// Falls back to the decoded JSON when the descriptor did not parse.
    pub fn task_completed(&self) -> bool {
        match &self.descriptor {
            Some(descriptor) => descriptor.is_completed(),
            None => self
                .output
                .get("task_completed")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
        }
    }

    /// Compact JSON used as the assistant turn on the next step.
    pub fn assistant_content(&self) -> String {
        serde_json::to_string(&self.output).unwrap_or_else(|_| self.raw_output.clone())
    }
}

/// Turns sent to the model, excluding the system prompt.
///
/// Grows by one user turn per step, preceded from the second step on by the
/// previous record as an assistant turn. Turns are never removed.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    turns: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_assistant(&mut self, record: &ExecutionRecord) {
        self.turns.push(ChatMessage::assistant(record.assistant_content()));
    }

    pub fn push_user(&mut self, instruction: &str, image_data_url: &str) {
        self.turns
            .push(ChatMessage::user_with_image(user_prompt(instruction), image_data_url));
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn assistant_turns(&self) -> usize {
        self.turns.iter().filter(|t| t.role == "assistant").count()
    }

    /// user/assistant alternate, starting and ending with user.
    pub fn is_well_formed(&self) -> bool {
        !self.turns.is_empty()
            && self.turns.len() % 2 == 1
            && self.turns.iter().enumerate().all(|(i, t)| {
                t.role == if i % 2 == 0 { "user" } else { "assistant" }
            })
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

pub fn user_prompt(instruction: &str) -> String {
    format!("<Question>{instruction}</Question>\nCurrent screenshot:")
}

/// Append-only record log for one task, mirrored to a JSONL file.
pub struct SessionHistory {
    pub session_id: String,
    records: Vec<ExecutionRecord>,
    file_path: Option<PathBuf>,
}

impl SessionHistory {
    /// Persists under the user data dir.
    pub fn new() -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = data_dir_or_cwd().join(format!("session_{session_id}.jsonl"));
        Self {
            session_id,
            records: Vec::new(),
            file_path: Some(file_path),
        }
    }

    /// Keeps records in memory only.
    pub fn in_memory() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            records: Vec::new(),
            file_path: None,
        }
    }

    pub fn in_dir(dir: PathBuf) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        Self {
            session_id,
            records: Vec::new(),
            file_path: Some(file_path),
        }
    }

    pub fn push(&mut self, record: ExecutionRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&ExecutionRecord> {
        self.records.last()
    }

    pub fn file_path(&self) -> Option<&PathBuf> {
        self.file_path.as_ref()
    }

    /// Append the latest record to the JSONL file.
    pub fn flush(&self) -> PilotResult<()> {
        let (Some(path), Some(last)) = (&self.file_path, self.records.last()) else {
            return Ok(());
        };
        let line = serde_json::to_string(last)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %path.display(), "history entry flushed");
        Ok(())
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// `<data_local_dir>/phonepilot/sessions`, falling back to the working directory.
fn data_dir_or_cwd() -> PathBuf {
    if let Some(base) = dirs::data_local_dir() {
        let d = base.join("phonepilot").join("sessions");
        if std::fs::create_dir_all(&d).is_ok() {
            return d;
        }
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
