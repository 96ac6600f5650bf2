//! 无效回复的重试策略
//!
//! 计数器只统计「当前这一轮」连续的无效回复，下一次有效回复即清零；
//! 计数不超过上限时给出纠正提示，超过则终止。

use crate::core::RecoveryAction;

/// 纠正提示模板中被替换为无效原因的占位符
pub const REASON_PLACEHOLDER: &str = "{reason}";

/// 默认纠正提示
pub const DEFAULT_RETRY_INSTRUCTION: &str =
    "The previous response was invalid ({reason}). Please retry using a valid function and JSON arguments.";

/// 默认允许的额外重试次数
pub const DEFAULT_MAX_RETRIES: u32 = 1;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    instruction: String,
    retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, instruction: impl Into<String>) -> Self {
        Self {
            max_retries,
            instruction: instruction.into(),
            retries: 0,
        }
    }

    /// 记录一次无效回复并给出动作
    pub fn on_invalid(&mut self, reason: &str) -> RecoveryAction {
        self.retries += 1;
        if self.retries > self.max_retries {
            return RecoveryAction::Abort;
        }
        RecoveryAction::RetryWithPrompt(self.instruction.replace(REASON_PLACEHOLDER, reason))
    }

    /// 有效回复后清零
    pub fn on_valid(&mut self) {
        self.retries = 0;
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INSTRUCTION)
    }
}
