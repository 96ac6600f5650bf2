//! 会话状态定义：编排器阶段与最终结果

use serde::Serialize;

/// 编排器阶段（状态机）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    AwaitingReply,
    Validating,
    Retrying,
    Dispatching,
    Terminated,
    Aborted,
}

/// 会话中止原因
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum AbortReason {
    /// 连续无效回复超过重试上限；携带最后一次的原因
    RetriesExhausted { last_reason: String },
    /// 模型调用本身失败（网络 / 服务端）；详细原因只写日志
    ModelUnavailable,
}

/// 会话最终结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SessionOutcome {
    /// 模型调用了 terminate
    Terminated,
    Aborted(AbortReason),
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Terminated)
    }

    /// 导出 / 日志用的短标签
    pub fn label(&self) -> &'static str {
        match self {
            SessionOutcome::Terminated => "terminated",
            SessionOutcome::Aborted(AbortReason::RetriesExhausted { .. }) => "aborted_invalid_replies",
            SessionOutcome::Aborted(AbortReason::ModelUnavailable) => "aborted_model_unavailable",
        }
    }
}
