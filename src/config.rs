use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    /// Full chat-completions endpoint URL.
    pub api_base: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    /// Use SSE streaming. Local GUI models usually answer in one shot.
    #[serde(default)]
    pub stream: bool,
    /// HTTP-level timeout for one request.
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
    /// Optional API key stored in config.toml (falls back to env var PHONEPILOT_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

/// A local AgentCPM-GUI server, so a missing config.toml still yields a
/// usable provider.
impl Default for LlmConfig {
    fn default() -> Self {
        let local = ProviderEntry {
            display_name: "AgentCPM-GUI (local)".into(),
            api_base: "http://127.0.0.1:8000/v1/chat/completions".into(),
            model: "AgentCPM-GUI".into(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            stream: false,
            timeout_secs: default_request_timeout(),
            api_key: None,
        };
        Self {
            active_provider: "local".into(),
            providers: HashMap::from([("local".to_string(), local)]),
        }
    }
}

fn default_temperature() -> f64 {
    0.1
}

fn default_top_p() -> f64 {
    0.3
}

fn default_request_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_adb_path")]
    pub adb_path: String,
    /// Target a specific device (`adb -s <serial>`); None uses the only attached device.
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Cache `wm size` for the session instead of querying before every mapped point.
    #[serde(default)]
    pub cache_screen_size: bool,
}

fn default_adb_path() -> String {
    "adb".into()
}

fn default_command_timeout() -> u64 {
    15
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: default_adb_path(),
            serial: None,
            command_timeout_secs: default_command_timeout(),
            cache_screen_size: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_text_settle")]
    pub text_settle_ms: u64,
    #[serde(default = "default_inference_timeout")]
    pub inference_timeout_secs: u64,
    /// Mark `thought` as required in the action schema sent to the model.
    #[serde(default = "default_true")]
    pub require_thought: bool,
    /// Append every execution record to a JSONL file in the user data dir.
    #[serde(default = "default_true")]
    pub session_log: bool,
}

fn default_max_steps() -> u32 {
    10
}

fn default_settle_delay() -> u64 {
    1000
}

fn default_text_settle() -> u64 {
    500
}

fn default_inference_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            settle_delay_ms: default_settle_delay(),
            text_settle_ms: default_text_settle(),
            inference_timeout_secs: default_inference_timeout(),
            require_thought: true,
            session_log: true,
        }
    }
}

/// Read-only screen monitor for external viewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_monitor_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_monitor_output")]
    pub output_path: PathBuf,
}

fn default_monitor_interval() -> u64 {
    1000
}

fn default_monitor_output() -> PathBuf {
    PathBuf::from("latest_frame.png")
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_monitor_interval(),
            output_path: default_monitor_output(),
        }
    }
}

fn resolve_config_path() -> PilotResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(PilotError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

/// Load from an explicit path, or search the default locations.
pub fn load_config(explicit: Option<&Path>) -> PilotResult<AppConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => resolve_config_path()?,
    };
    let content = std::fs::read_to_string(&path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> PilotResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
