use thiserror::Error;

#[derive(Debug, Error)]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// No device reachable: adb missing, device offline, or a command timed out.
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Device reachable but the command was rejected.
    #[error("Device command failed: {stderr}")]
    CommandFailure { stderr: String },

    #[error("Screen size query failed: {0}")]
    ScreenQuery(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    #[error("Inference timed out after {0}s")]
    InferenceTimeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Task cancelled")]
    Cancelled,
}

impl PilotError {
    /// Decode failures are absorbed into history; everything else ends the loop.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PilotError::Decode(_))
    }
}

pub type PilotResult<T> = Result<T, PilotError>;
