//! Bicameral - 单智能体编排器
//!
//! 入口：加载 .env、解析参数、初始化日志、加载配置，运行一次终端会话并映射退出码。

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use bicameral::agent::{run_terminal_session, SessionOptions};
use bicameral::config::load_config;
use bicameral::core::SessionOutcome;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "bicameral")]
#[command(about = "Run the bicameral agent")]
struct Cli {
    /// Path to the system prompt text file
    prompt: PathBuf,

    /// Path to the agent memory file
    #[arg(long, value_name = "PATH")]
    memory_file: Option<PathBuf>,

    /// Create the memory file if it does not exist
    #[arg(long)]
    init: bool,

    /// Enable debug logging to the console
    #[arg(long)]
    debug: bool,

    /// Additional TOML config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the session transcript as JSON when the session ends
    #[arg(long, value_name = "PATH")]
    transcript: Option<PathBuf>,
}

async fn run(cli: Cli) -> anyhow::Result<SessionOutcome> {
    let cfg = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let opts = SessionOptions {
        prompt_path: cli.prompt,
        memory_file: cli.memory_file,
        init_memory: cli.init,
        transcript_path: cli.transcript,
    };
    let outcome = run_terminal_session(&cfg, &opts)
        .await
        .context("Agent session failed")?;
    Ok(outcome)
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env 先于任何环境变量读取
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    bicameral::observability::init(cli.debug);

    match run(cli).await {
        Ok(outcome) if outcome.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = ?e, "Agent terminated with an error");
            println!("The agent stopped because of an internal error. Please check the logs for details.");
            ExitCode::FAILURE
        }
    }
}
