//! 能力注册表与分发
//!
//! 持有状态存储、用户通道与固定的能力声明；dispatch 只接受已校验的 CapabilityCall，
//! 同步等待能力完成，并为每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use crate::channel::UserChannel;
use crate::core::AgentError;
use crate::llm::CandidateReply;
use crate::memory::MemoryStore;
use crate::tools::{capability_descriptors, validate, CapabilityCall, CapabilityDescriptor, ValidationOutcome};

/// 一次分发的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// 能力返回的载荷，将作为 CapabilityResultTurn 写回会话记录
    Result(Value),
    /// terminate：结束会话
    Terminate,
}

pub struct CapabilityRegistry {
    memory: MemoryStore,
    channel: Arc<dyn UserChannel>,
    descriptors: Vec<CapabilityDescriptor>,
}

impl CapabilityRegistry {
    pub fn new(memory: MemoryStore, channel: Arc<dyn UserChannel>) -> Self {
        Self {
            memory,
            channel,
            descriptors: capability_descriptors(),
        }
    }

    /// 会话内固定不变的能力声明
    pub fn descriptors(&self) -> &[CapabilityDescriptor] {
        &self.descriptors
    }

    pub fn validate(&self, reply: &CandidateReply) -> ValidationOutcome {
        validate(reply)
    }

    pub fn channel(&self) -> &Arc<dyn UserChannel> {
        &self.channel
    }

    /// 执行能力；存储写失败、通道失败返回 AgentError（对会话致命）
    pub async fn dispatch(&self, call: &CapabilityCall) -> Result<Dispatched, AgentError> {
        let start = Instant::now();
        let result = match call {
            CapabilityCall::GetMemory => self
                .memory
                .read()
                .and_then(|state| {
                    serde_json::to_value(state)
                        .map_err(|e| AgentError::Storage(format!("serialize state: {e}")))
                })
                .map(Dispatched::Result),
            CapabilityCall::UpdateMemory { state } => self
                .memory
                .write(state)
                .map(|()| Dispatched::Result(json!({"status": "ok"}))),
            CapabilityCall::SendMessage { text } => self
                .channel
                .send(text)
                .await
                .map(|()| Dispatched::Result(json!({"status": "sent"}))),
            CapabilityCall::ReceiveResponse => self
                .channel
                .receive()
                .await
                .map(|input| Dispatched::Result(json!({"response": input}))),
            CapabilityCall::Terminate => Ok(Dispatched::Terminate),
        };

        let audit = json!({
            "event": "capability_audit",
            "capability": call.name(),
            "ok": result.is_ok(),
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(call),
        });
        tracing::info!(audit = %audit, "capability");

        result
    }
}

fn args_preview(call: &CapabilityCall) -> String {
    let s = match call {
        CapabilityCall::UpdateMemory { state } => serde_json::to_string(state).unwrap_or_default(),
        CapabilityCall::SendMessage { text } => text.clone(),
        _ => String::new(),
    };
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
