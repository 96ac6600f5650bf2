//! 会话装配
//!
//! 根据 AppConfig 与命令行覆盖项构建 MemoryStore / ModelClient / CapabilityRegistry / Orchestrator，
//! 并在会话结束后按需导出会话记录。入口只负责解析参数与映射退出码。

use std::path::PathBuf;
use std::sync::Arc;

use crate::channel::{StdioChannel, UserChannel};
use crate::config::{read_prompt, require_api_key, resolve_model, AppConfig, SessionConfig};
use crate::core::{AgentError, Orchestrator, SessionOutcome};
use crate::llm::{ModelClient, OpenAiClient};
use crate::memory::{MemoryStore, TranscriptPersistence};
use crate::tools::CapabilityRegistry;

/// 命令行覆盖项（均为可选，未给出时使用配置值）
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub prompt_path: PathBuf,
    pub memory_file: Option<PathBuf>,
    /// 为 true 时强制开启「缺失时初始化」
    pub init_memory: bool,
    pub transcript_path: Option<PathBuf>,
}

/// 用已构建好的模型客户端与用户通道装配编排器
pub fn build_orchestrator(
    cfg: &AppConfig,
    opts: &SessionOptions,
    model: Arc<dyn ModelClient>,
    channel: Arc<dyn UserChannel>,
) -> Result<Orchestrator, AgentError> {
    let prompt = read_prompt(&opts.prompt_path)?;
    let memory_path = opts
        .memory_file
        .clone()
        .unwrap_or_else(|| cfg.agent.memory_file.clone());
    let memory = MemoryStore::new(memory_path, opts.init_memory || cfg.agent.init_memory);
    let registry = CapabilityRegistry::new(memory, channel);
    Ok(Orchestrator::new(
        SessionConfig::from_agent_section(prompt, &cfg.agent),
        model,
        registry,
    ))
}

/// 从环境构建 OpenAI 兼容客户端
pub fn create_model_from_config(cfg: &AppConfig) -> Result<Arc<dyn ModelClient>, AgentError> {
    let api_key = require_api_key()?;
    let model = resolve_model(&cfg.llm);
    Ok(Arc::new(OpenAiClient::new(
        cfg.llm.base_url.as_deref(),
        &model,
        &api_key,
        cfg.llm.request_timeout_secs,
    )))
}

/// 运行一次会话；致命错误原样返回，导出（若配置）在任何结局下都会尝试
pub async fn run_session(
    cfg: &AppConfig,
    opts: &SessionOptions,
    model: Arc<dyn ModelClient>,
    channel: Arc<dyn UserChannel>,
) -> Result<SessionOutcome, AgentError> {
    let report = build_orchestrator(cfg, opts, model, channel)?.run().await;

    if let Some(path) = &opts.transcript_path {
        let label = match &report.outcome {
            Ok(outcome) => outcome.label(),
            Err(_) => "error",
        };
        if let Err(e) = TranscriptPersistence::new(path).save(&report.transcript, label) {
            tracing::warn!(path = %path.display(), error = %e, "transcript export failed");
        }
    }
    report.outcome
}

/// 终端会话：stdin / stdout 通道 + 配置中的模型
pub async fn run_terminal_session(cfg: &AppConfig, opts: &SessionOptions) -> Result<SessionOutcome, AgentError> {
    let model = create_model_from_config(cfg)?;
    run_session(cfg, opts, model, Arc::new(StdioChannel::new())).await
}
