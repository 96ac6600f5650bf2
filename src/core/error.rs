//! Agent 错误类型与恢复动作
//!
//! 与 RetryPolicy 配合：可通过重新请求模型修复的问题在编排器内部消化（RetryWithPrompt），
//! 其余错误（存储写失败、用户通道失败、配置错误）终止会话并上报。

use thiserror::Error;

use crate::llm::LlmError;

/// 会话运行过程中可能出现的致命错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AgentError {
    /// 状态文件写入失败（读失败会回退为默认状态，不会走到这里）
    #[error("Storage error: {0}")]
    Storage(String),

    /// 用户通道读写失败（stdout 写失败、stdin 已关闭等）
    #[error("User channel error: {0}")]
    Channel(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// 重试策略对一次无效回复给出的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 追加一条纠正性 system 消息后重新请求模型
    RetryWithPrompt(String),
    /// 重试预算耗尽，终止会话
    Abort,
}
