pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::agent_engine::engine::AgentEngine;
use crate::agent_engine::event_bus::{AgentMessage, ControlCommand, EventBus};
use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::prompt::build_system_prompt;
use crate::agent_engine::state::{AgentState, LoopConfig};
use crate::config::AppConfig;
use crate::errors::PilotResult;
use crate::executor::adb::AdbChannel;
use crate::executor::channel::DeviceCommandChannel;
use crate::executor::coordinator::CoordinateMapper;
use crate::executor::dispatcher::ActionTranslator;
use crate::executor::screen::{ScreenSizeSource, SizePolicy};
use crate::llm::registry::ProviderRegistry;
use crate::llm::types::StreamChunkKind;
use crate::perception::monitor::FrameMonitor;
use crate::perception::screenshot::{AdbScreenCapture, ScreenCapture};

/// Per-invocation overrides on top of config.toml.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub instruction: String,
    pub config_path: Option<PathBuf>,
    pub max_steps: Option<u32>,
    pub provider: Option<String>,
    pub serial: Option<String>,
    pub cache_screen_size: bool,
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn resolve_config(opts: &RunOptions) -> AppConfig {
    let mut config = match config::load_config(opts.config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config; using defaults");
            AppConfig::default()
        }
    };
    if let Some(max_steps) = opts.max_steps {
        config.agent.max_steps = max_steps;
    }
    if let Some(serial) = &opts.serial {
        config.device.serial = Some(serial.clone());
    }
    if opts.cache_screen_size {
        config.device.cache_screen_size = true;
    }
    config
}

/// Runs one instruction against the attached device.
pub async fn run(opts: RunOptions) -> PilotResult<AgentState> {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let config = resolve_config(&opts);

    let mut registry = ProviderRegistry::from_config(&config);
    if let Some(provider) = &opts.provider {
        registry.set_active(provider.clone())?;
    }
    let (provider, call_config) = registry.active_call_config()?;

    let channel: Arc<dyn DeviceCommandChannel> = Arc::new(AdbChannel::connect(&config.device).await?);
    let policy = if config.device.cache_screen_size {
        SizePolicy::CacheUntilMismatch
    } else {
        SizePolicy::QueryEachTime
    };
    let mapper = CoordinateMapper::new(ScreenSizeSource::new(channel.clone(), policy));
    let translator = ActionTranslator::new(
        channel.clone(),
        mapper,
        Duration::from_millis(config.agent.text_settle_ms),
    );
    let capture: Arc<dyn ScreenCapture> = Arc::new(AdbScreenCapture::new(channel.clone()));

    let monitor = config.monitor.enabled.then(|| {
        FrameMonitor::spawn(
            Arc::new(AdbScreenCapture::new(channel.clone())),
            Duration::from_millis(config.monitor.interval_ms),
            Some(config.monitor.output_path.clone()),
        )
    });

    let history = if config.agent.session_log {
        SessionHistory::new()
    } else {
        SessionHistory::in_memory()
    };

    let mut engine = AgentEngine::new(
        LoopConfig::from(&config.agent),
        capture,
        translator,
        provider,
        call_config,
        build_system_prompt(config.agent.require_thought)?,
        history,
        EventBus::new(),
    );

    let stop = engine.stop_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received; stopping after the current step");
            let _ = stop.send(ControlCommand::Stop).await;
        }
    });
    let printer = tokio::spawn(print_stream(engine.subscribe()));

    let state = engine.run(&opts.instruction).await;

    ctrl_c.abort();
    printer.abort();
    if let Some(monitor) = monitor {
        monitor.stop();
    }
    Ok(state)
}

/// Echoes streamed model output to stderr as it arrives.
async fn print_stream(mut rx: tokio::sync::broadcast::Receiver<AgentMessage>) {
    use std::io::Write;
    loop {
        match rx.recv().await {
            Ok(AgentMessage::InferenceChunk(chunk)) => match chunk.kind {
                StreamChunkKind::Content => {
                    eprint!("{}", chunk.content);
                    let _ = std::io::stderr().flush();
                }
                StreamChunkKind::Done => eprintln!(),
                StreamChunkKind::Reasoning => {}
            },
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!(skipped = n, "stream printer lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_win_over_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent]\nmax_steps = 4\n\n[device]\nserial = \"abc\"\n").unwrap();

        let opts = RunOptions {
            instruction: "x".into(),
            config_path: Some(path.clone()),
            max_steps: Some(7),
            cache_screen_size: true,
            ..Default::default()
        };
        let cfg = resolve_config(&opts);
        assert_eq!(cfg.agent.max_steps, 7);
        assert_eq!(cfg.device.serial.as_deref(), Some("abc"));
        assert!(cfg.device.cache_screen_size);
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let opts = RunOptions {
            config_path: Some(PathBuf::from("/nonexistent/phonepilot/config.toml")),
            ..Default::default()
        };
        let cfg = resolve_config(&opts);
        assert_eq!(cfg.agent.max_steps, 10);
        assert_eq!(cfg.device.adb_path, "adb");
        assert!(ProviderRegistry::from_config(&cfg).active_call_config().is_ok());
    }
}
