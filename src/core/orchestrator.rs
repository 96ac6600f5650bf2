//! 编排器：主控循环
//!
//! AwaitingReply -> Validating -> {Retrying | Dispatching} -> AwaitingReply，终态 Terminated / Aborted。
//! 每轮用完整会话记录请求模型；无效回复走 RetryPolicy，有效回复先写入 AssistantTurn 再分发能力，
//! 能力结果写回 CapabilityResultTurn。能力调用严格按会话记录顺序、一次一个地执行。

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::core::{AbortReason, AgentError, RecoveryAction, RetryPolicy, SessionOutcome, SessionPhase};
use crate::llm::ModelClient;
use crate::memory::Transcript;
use crate::tools::{CapabilityRegistry, Dispatched, ValidationOutcome};

/// 会话结束时的完整结果：结局、会话记录与 token 统计
///
/// outcome 为 Err 仅限致命错误（状态写失败、用户通道失败）；重试耗尽与模型失败是正常的 Aborted 结局。
/// 无论哪种情况都交回已积累的会话记录。
#[derive(Debug)]
pub struct SessionReport {
    pub outcome: Result<SessionOutcome, AgentError>,
    pub transcript: Transcript,
    /// (prompt, completion, total)
    pub token_usage: (u64, u64, u64),
}

pub struct Orchestrator {
    config: SessionConfig,
    model: Arc<dyn ModelClient>,
    registry: CapabilityRegistry,
    transcript: Transcript,
    retry: RetryPolicy,
    phase: SessionPhase,
}

impl Orchestrator {
    pub fn new(config: SessionConfig, model: Arc<dyn ModelClient>, registry: CapabilityRegistry) -> Self {
        let transcript = Transcript::new(config.prompt.clone());
        let retry = RetryPolicy::new(config.max_retries, config.retry_instruction.clone());
        Self {
            config,
            model,
            registry,
            transcript,
            retry,
            phase: SessionPhase::AwaitingReply,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        debug!(from = ?self.phase, to = ?phase, "phase");
        self.phase = phase;
    }

    /// 运行会话直到 terminate、中止或致命错误
    pub async fn run(mut self) -> SessionReport {
        info!(model = self.model.model_name(), "session started");
        let outcome = self.drive().await;
        let token_usage = self.model.token_usage();
        let (prompt_tokens, completion_tokens, total_tokens) = token_usage;
        match &outcome {
            Ok(o) => info!(
                outcome = o.label(),
                turns = self.transcript.len(),
                prompt_tokens,
                completion_tokens,
                total_tokens,
                "session finished"
            ),
            Err(e) => error!(
                error = %e,
                turns = self.transcript.len(),
                prompt_tokens,
                completion_tokens,
                total_tokens,
                "session failed"
            ),
        }
        SessionReport {
            outcome,
            transcript: self.transcript,
            token_usage,
        }
    }

    async fn drive(&mut self) -> Result<SessionOutcome, AgentError> {
        loop {
            self.set_phase(SessionPhase::AwaitingReply);
            let reply = match self
                .model
                .complete(&self.transcript, self.registry.descriptors())
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    error!(error = %e, "model request failed");
                    let notice = self.config.model_failure_notice.clone();
                    return self.abort(AbortReason::ModelUnavailable, &notice).await;
                }
            };
            if let Some(text) = &reply.text {
                debug!(content = %text, "model content");
            }
            for call in &reply.calls {
                info!(name = %call.name, arguments = %call.raw_arguments, "model function call");
            }

            self.set_phase(SessionPhase::Validating);
            let call = match self.registry.validate(&reply) {
                ValidationOutcome::Valid(call) => call,
                ValidationOutcome::Invalid(reason) => {
                    warn!(reason = %reason, "invalid model reply");
                    match self.retry.on_invalid(&reason) {
                        RecoveryAction::RetryWithPrompt(prompt) => {
                            self.set_phase(SessionPhase::Retrying);
                            self.transcript.push_system(prompt);
                            continue;
                        }
                        RecoveryAction::Abort => {
                            let notice = self.config.invalid_replies_notice.clone();
                            return self
                                .abort(AbortReason::RetriesExhausted { last_reason: reason }, &notice)
                                .await;
                        }
                    }
                }
            };

            self.retry.on_valid();
            self.set_phase(SessionPhase::Dispatching);
            let proposed = reply.calls.into_iter().next();
            let call_id = proposed.as_ref().and_then(|c| c.id.clone());
            self.transcript.push_assistant(reply.text, proposed);

            match self.registry.dispatch(&call).await? {
                Dispatched::Result(payload) => {
                    self.transcript.push_result(call.name(), call_id, payload);
                }
                Dispatched::Terminate => {
                    self.set_phase(SessionPhase::Terminated);
                    self.registry.channel().send(&self.config.ended_notice).await?;
                    return Ok(SessionOutcome::Terminated);
                }
            }
        }
    }

    async fn abort(&mut self, reason: AbortReason, notice: &str) -> Result<SessionOutcome, AgentError> {
        self.set_phase(SessionPhase::Aborted);
        error!(reason = ?reason, "session aborted");
        self.registry.channel().send(notice).await?;
        Ok(SessionOutcome::Aborted(reason))
    }
}
