//! LLM 层：模型客户端抽象与实现（OpenAI 兼容 / Scripted）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::ScriptedModelClient;
pub use openai::{OpenAiClient, DEFAULT_MODEL};
pub use traits::{CandidateReply, LlmError, ModelClient, TokenUsage};
