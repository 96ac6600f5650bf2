//! 核心编排层：错误、重试策略、会话状态、主控循环

pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod state;

pub use error::{AgentError, RecoveryAction};
pub use orchestrator::{Orchestrator, SessionReport};
pub use recovery::RetryPolicy;
pub use state::{AbortReason, SessionOutcome, SessionPhase};
