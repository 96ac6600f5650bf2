//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BICAMERAL__*` 覆盖（双下划线表示嵌套，如 `BICAMERAL__AGENT__MAX_RETRIES=2`）。
//! 命令行参数与 `OPENAI_MODEL_ID` 在此之后由入口覆盖。

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::recovery::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INSTRUCTION};
use crate::core::AgentError;
use crate::llm::DEFAULT_MODEL;
use crate::memory::DEFAULT_MEMORY_FILE;

/// 模型标识环境变量
pub const MODEL_ENV: &str = "OPENAI_MODEL_ID";
/// API Key 环境变量
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentSection,
    pub llm: LlmSection,
}

/// [agent] 段：状态文件、重试预算与面向用户的提示文本
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub memory_file: PathBuf,
    /// 状态文件不存在时是否创建
    pub init_memory: bool,
    /// 连续无效回复允许的额外重试次数
    pub max_retries: u32,
    /// 纠正提示模板，`{reason}` 会被替换为无效原因
    pub retry_instruction: String,
    pub invalid_replies_notice: String,
    pub model_failure_notice: String,
    pub ended_notice: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            memory_file: PathBuf::from(DEFAULT_MEMORY_FILE),
            init_memory: false,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_instruction: DEFAULT_RETRY_INSTRUCTION.to_string(),
            invalid_replies_notice: "The AI repeatedly returned invalid responses. Exiting.".to_string(),
            model_failure_notice:
                "An error occurred while communicating with the AI service. Please check the logs for details."
                    .to_string(),
            ended_notice: "Session ended.".to_string(),
        }
    }
}

/// [llm] 段：模型、端点与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            request_timeout_secs: 60,
        }
    }
}

/// 从 config 目录加载配置，环境变量 BICAMERAL__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（必须存在，可覆盖前面的键）
/// 3. 最后叠加环境变量 BICAMERAL__*
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "default"] {
        if Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BICAMERAL")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// 单次会话的配置：传入编排器，不存在进程级可变状态
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// system prompt 原文
    pub prompt: String,
    pub max_retries: u32,
    pub retry_instruction: String,
    pub invalid_replies_notice: String,
    pub model_failure_notice: String,
    pub ended_notice: String,
}

impl SessionConfig {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self::from_agent_section(prompt, &AgentSection::default())
    }

    pub fn from_agent_section(prompt: impl Into<String>, agent: &AgentSection) -> Self {
        Self {
            prompt: prompt.into(),
            max_retries: agent.max_retries,
            retry_instruction: agent.retry_instruction.clone(),
            invalid_replies_notice: agent.invalid_replies_notice.clone(),
            model_failure_notice: agent.model_failure_notice.clone(),
            ended_notice: agent.ended_notice.clone(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// 读取 system prompt 文件
pub fn read_prompt(path: &Path) -> Result<String, AgentError> {
    std::fs::read_to_string(path)
        .map_err(|e| AgentError::Config(format!("cannot read prompt file {}: {e}", path.display())))
}

/// 模型标识：环境变量优先，否则用配置值
pub fn resolve_model(cfg: &LlmSection) -> String {
    std::env::var(MODEL_ENV)
        .ok()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| cfg.model.clone())
}

/// API Key 必须来自环境变量或 .env
pub fn require_api_key() -> Result<String, AgentError> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| AgentError::Config(format!("{API_KEY_ENV} not set in .env or environment variables")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.memory_file, PathBuf::from("agent_state.json"));
        assert!(!cfg.agent.init_memory);
        assert_eq!(cfg.agent.max_retries, 1);
        assert!(cfg.agent.retry_instruction.contains("{reason}"));
        assert_eq!(cfg.llm.model, "gpt-4o");
    }

    #[test]
    fn test_explicit_config_file_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(
            &path,
            "[agent]\nmax_retries = 3\nmemory_file = \"state/x.json\"\n\n[llm]\nrequest_timeout_secs = 5\n",
        )
        .unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.agent.max_retries, 3);
        assert_eq!(cfg.agent.memory_file, PathBuf::from("state/x.json"));
        assert_eq!(cfg.agent.ended_notice, "Session ended.");
        assert_eq!(cfg.llm.request_timeout_secs, 5);
        assert_eq!(cfg.llm.model, "gpt-4o");
    }

    #[test]
    fn test_missing_explicit_config_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_session_config_from_section() {
        let agent = AgentSection {
            max_retries: 4,
            ..Default::default()
        };
        let s = SessionConfig::from_agent_section("prompt", &agent);
        assert_eq!(s.prompt, "prompt");
        assert_eq!(s.max_retries, 4);
        assert_eq!(s.ended_notice, "Session ended.");
    }

    #[test]
    fn test_read_prompt_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_prompt(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }
}
