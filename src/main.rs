use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use phonepilot_lib::agent_engine::state::{AbortReason, AgentState};
use phonepilot_lib::RunOptions;

/// Drive an Android phone with a GUI agent model over ADB.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "phonepilot")]
struct Cli {
    /// Natural-language task, e.g. "open Settings and enable Wi-Fi"
    instruction: String,
    /// Path to config.toml (default: next to the executable, then the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Step budget for this task
    #[arg(long)]
    max_steps: Option<u32>,
    /// Provider id from [llm.providers] to use instead of active_provider
    #[arg(long)]
    provider: Option<String>,
    /// adb serial of the target device
    #[arg(short, long)]
    serial: Option<String>,
    /// Query `wm size` once and reuse it until the frame size changes
    #[arg(long)]
    cache_screen_size: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    phonepilot_lib::init_tracing();
    let cli = Cli::parse();

    let opts = RunOptions {
        instruction: cli.instruction,
        config_path: cli.config,
        max_steps: cli.max_steps,
        provider: cli.provider,
        serial: cli.serial,
        cache_screen_size: cli.cache_screen_size,
    };

    match phonepilot_lib::run(opts).await {
        Ok(AgentState::Completed { steps }) => {
            tracing::info!(steps, "task completed");
            ExitCode::SUCCESS
        }
        Ok(AgentState::Aborted { reason: AbortReason::StepLimitExceeded }) => {
            tracing::warn!("step limit reached before the task completed");
            ExitCode::from(2)
        }
        Ok(AgentState::Aborted { reason: AbortReason::Cancelled }) => ExitCode::from(130),
        Ok(state) => {
            tracing::error!(?state, "task aborted");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "phonepilot failed");
            ExitCode::FAILURE
        }
    }
}
