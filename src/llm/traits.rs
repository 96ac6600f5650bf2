//! 模型客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Scripted）实现 ModelClient：每次 complete 恰好一次网络往返，
//! 传输或服务端失败返回 LlmError，而不是一个「看起来无效」的回复。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::{ProposedCall, Transcript};
use crate::tools::CapabilityDescriptor;

/// 模型客户端错误（与模型回复格式无关的失败）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("response contained no choices")]
    EmptyResponse,
}

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    /// (prompt, completion, total)
    pub fn get(&self) -> (u64, u64, u64) {
        let p = self.prompt_tokens.load(Ordering::Relaxed);
        let c = self.completion_tokens.load(Ordering::Relaxed);
        (p, c, p + c)
    }
}

/// 模型的一次候选回复：可选的自由文本与零个或多个函数调用
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateReply {
    pub text: Option<String>,
    pub calls: Vec<ProposedCall>,
}

impl CandidateReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            calls: Vec::new(),
        }
    }

    pub fn call(name: impl Into<String>, raw_arguments: impl Into<String>) -> Self {
        Self {
            text: None,
            calls: vec![ProposedCall::new(name, raw_arguments)],
        }
    }
}

/// 模型客户端 trait
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// 以完整会话记录与能力声明请求一次回复
    async fn complete(
        &self,
        transcript: &Transcript,
        capabilities: &[CapabilityDescriptor],
    ) -> Result<CandidateReply, LlmError>;

    /// 模型标识（用于日志）
    fn model_name(&self) -> &str {
        "unknown"
    }

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
