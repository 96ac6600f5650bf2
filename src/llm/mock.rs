//! 脚本化模型客户端（用于测试与离线演练，无需 API）
//!
//! 按顺序返回预先给定的回复；脚本用尽后返回 LlmError，并记录每次调用时看到的会话记录。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{CandidateReply, LlmError, ModelClient, TokenUsage};
use crate::memory::{Transcript, Turn};
use crate::tools::CapabilityDescriptor;

#[derive(Debug, Default)]
pub struct ScriptedModelClient {
    replies: Mutex<VecDeque<Result<CandidateReply, LlmError>>>,
    seen: Mutex<Vec<Vec<Turn>>>,
    seen_capabilities: Mutex<Vec<Vec<String>>>,
    /// 每次成功回复计入的 (prompt, completion) token 数
    per_reply_usage: (u64, u64),
    usage: TokenUsage,
}

impl ScriptedModelClient {
    pub fn new(replies: impl IntoIterator<Item = Result<CandidateReply, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Default::default()
        }
    }

    /// 只包含成功回复的脚本
    pub fn from_replies(replies: impl IntoIterator<Item = CandidateReply>) -> Self {
        Self::new(replies.into_iter().map(Ok))
    }

    /// 每次成功回复累计给定的 token 数，模拟服务端 usage 字段
    pub fn with_usage(mut self, prompt: u64, completion: u64) -> Self {
        self.per_reply_usage = (prompt, completion);
        self
    }

    /// 已发生的调用次数
    pub fn calls(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// 第 n 次调用时模型看到的会话记录
    pub fn transcript_at(&self, n: usize) -> Option<Vec<Turn>> {
        self.seen.lock().ok().and_then(|s| s.get(n).cloned())
    }

    /// 第 n 次调用时声明的能力名
    pub fn capabilities_at(&self, n: usize) -> Option<Vec<String>> {
        self.seen_capabilities
            .lock()
            .ok()
            .and_then(|s| s.get(n).cloned())
    }

    /// 剩余未消费的回复数
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn complete(
        &self,
        transcript: &Transcript,
        capabilities: &[CapabilityDescriptor],
    ) -> Result<CandidateReply, LlmError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(transcript.turns().to_vec());
        }
        if let Ok(mut seen) = self.seen_capabilities.lock() {
            seen.push(capabilities.iter().map(|d| d.name.clone()).collect());
        }
        let reply = self
            .replies
            .lock()
            .map_err(|e| LlmError::Request(e.to_string()))?
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Request("script exhausted".to_string())))?;
        let (prompt, completion) = self.per_reply_usage;
        self.usage.add(prompt, completion);
        Ok(reply)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }
}
