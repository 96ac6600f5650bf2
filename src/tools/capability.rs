//! 能力种类与模型回复校验
//!
//! 模型提出的调用按名称映射到封闭枚举 CapabilityKind；不认识的名字落到 Unrecognized，永远判为无效。
//! 只有「恰好一个调用 + 已知名称 + 参数可解析为对应类型」的回复才会变成可分发的 CapabilityCall。

use serde_json::{Map, Value};

use crate::llm::CandidateReply;
use crate::memory::AgentMemoryState;
use crate::tools::schema::{SendMessageArgs, UpdateMemoryArgs};

/// 能力种类（封闭集合 + 显式的未识别分支）
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CapabilityKind {
    GetMemory,
    UpdateMemory,
    SendMessage,
    ReceiveResponse,
    Terminate,
    Unrecognized(String),
}

impl CapabilityKind {
    /// 向模型声明、可被分发的全部能力（顺序即声明顺序）
    pub const KNOWN: [CapabilityKind; 5] = [
        CapabilityKind::GetMemory,
        CapabilityKind::UpdateMemory,
        CapabilityKind::SendMessage,
        CapabilityKind::ReceiveResponse,
        CapabilityKind::Terminate,
    ];

    pub fn from_name(name: &str) -> Self {
        match name {
            "get_memory" => CapabilityKind::GetMemory,
            "update_memory" => CapabilityKind::UpdateMemory,
            "send_message" => CapabilityKind::SendMessage,
            "receive_response" => CapabilityKind::ReceiveResponse,
            "terminate" => CapabilityKind::Terminate,
            other => CapabilityKind::Unrecognized(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CapabilityKind::GetMemory => "get_memory",
            CapabilityKind::UpdateMemory => "update_memory",
            CapabilityKind::SendMessage => "send_message",
            CapabilityKind::ReceiveResponse => "receive_response",
            CapabilityKind::Terminate => "terminate",
            CapabilityKind::Unrecognized(name) => name,
        }
    }
}

/// 已校验、带类型化参数的能力调用
#[derive(Clone, Debug, PartialEq)]
pub enum CapabilityCall {
    GetMemory,
    UpdateMemory { state: AgentMemoryState },
    SendMessage { text: String },
    ReceiveResponse,
    Terminate,
}

impl CapabilityCall {
    pub fn name(&self) -> &'static str {
        match self {
            CapabilityCall::GetMemory => "get_memory",
            CapabilityCall::UpdateMemory { .. } => "update_memory",
            CapabilityCall::SendMessage { .. } => "send_message",
            CapabilityCall::ReceiveResponse => "receive_response",
            CapabilityCall::Terminate => "terminate",
        }
    }
}

/// 校验结果
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationOutcome {
    Valid(CapabilityCall),
    Invalid(String),
}

/// 参数文本 -> JSON 对象；空文本视为 `{}`，非对象或语法错误返回 None
fn parse_arguments(raw: &str) -> Option<Map<String, Value>> {
    if raw.trim().is_empty() {
        return Some(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// 校验模型回复
pub fn validate(reply: &CandidateReply) -> ValidationOutcome {
    let call = match reply.calls.as_slice() {
        [] => return ValidationOutcome::Invalid("missing function call".to_string()),
        [call] => call,
        _ => return ValidationOutcome::Invalid("multiple function calls".to_string()),
    };

    let kind = CapabilityKind::from_name(&call.name);
    if let CapabilityKind::Unrecognized(name) = &kind {
        return ValidationOutcome::Invalid(format!("unknown function {name}"));
    }

    let invalid_args = || ValidationOutcome::Invalid(format!("invalid arguments for {}", call.name));
    let Some(args) = parse_arguments(&call.raw_arguments) else {
        return invalid_args();
    };

    let parsed = match kind {
        CapabilityKind::GetMemory => CapabilityCall::GetMemory,
        CapabilityKind::ReceiveResponse => CapabilityCall::ReceiveResponse,
        CapabilityKind::Terminate => CapabilityCall::Terminate,
        CapabilityKind::UpdateMemory => {
            match serde_json::from_value::<UpdateMemoryArgs>(Value::Object(args)) {
                Ok(a) => CapabilityCall::UpdateMemory { state: a.state },
                Err(_) => return invalid_args(),
            }
        }
        CapabilityKind::SendMessage => {
            match serde_json::from_value::<SendMessageArgs>(Value::Object(args)) {
                Ok(a) => CapabilityCall::SendMessage { text: a.text },
                Err(_) => return invalid_args(),
            }
        }
        CapabilityKind::Unrecognized(_) => return invalid_args(),
    };
    ValidationOutcome::Valid(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ProposedCall;
    use serde_json::json;

    fn invalid(reason: &str) -> ValidationOutcome {
        ValidationOutcome::Invalid(reason.to_string())
    }

    #[test]
    fn test_known_names_round_trip() {
        for kind in CapabilityKind::KNOWN {
            assert_eq!(CapabilityKind::from_name(kind.name()), kind);
        }
        assert_eq!(
            CapabilityKind::from_name("delete_everything"),
            CapabilityKind::Unrecognized("delete_everything".to_string())
        );
    }

    #[test]
    fn test_text_only_reply_is_missing_call() {
        assert_eq!(validate(&CandidateReply::text("hello")), invalid("missing function call"));
        assert_eq!(validate(&CandidateReply::default()), invalid("missing function call"));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            validate(&CandidateReply::call("launch_rocket", "{}")),
            invalid("unknown function launch_rocket")
        );
    }

    #[test]
    fn test_multiple_calls_rejected() {
        let reply = CandidateReply {
            text: None,
            calls: vec![
                ProposedCall::new("get_memory", "{}"),
                ProposedCall::new("terminate", "{}"),
            ],
        };
        assert_eq!(validate(&reply), invalid("multiple function calls"));
    }

    #[test]
    fn test_unparsable_arguments() {
        assert_eq!(
            validate(&CandidateReply::call("send_message", "{\"text\": ")),
            invalid("invalid arguments for send_message")
        );
        assert_eq!(
            validate(&CandidateReply::call("get_memory", "[1]")),
            invalid("invalid arguments for get_memory")
        );
    }

    #[test]
    fn test_absent_arguments_allowed_only_without_required_fields() {
        assert_eq!(
            validate(&CandidateReply::call("terminate", "")),
            ValidationOutcome::Valid(CapabilityCall::Terminate)
        );
        assert_eq!(
            validate(&CandidateReply::call("receive_response", "  ")),
            ValidationOutcome::Valid(CapabilityCall::ReceiveResponse)
        );
        assert_eq!(
            validate(&CandidateReply::call("send_message", "")),
            invalid("invalid arguments for send_message")
        );
        assert_eq!(
            validate(&CandidateReply::call("update_memory", "{}")),
            invalid("invalid arguments for update_memory")
        );
    }

    #[test]
    fn test_update_memory_with_non_object_state_is_invalid() {
        assert_eq!(
            validate(&CandidateReply::call("update_memory", r#"{"state": "done"}"#)),
            invalid("invalid arguments for update_memory")
        );
    }

    #[test]
    fn test_valid_update_memory() {
        let raw = json!({"state": {"step": 3, "history": ["a"], "complete": false}}).to_string();
        let expected = AgentMemoryState {
            step: 3,
            history: vec![json!("a")],
            complete: false,
            ..Default::default()
        };
        assert_eq!(
            validate(&CandidateReply::call("update_memory", raw)),
            ValidationOutcome::Valid(CapabilityCall::UpdateMemory { state: expected })
        );
    }

    #[test]
    fn test_valid_send_message_ignores_free_text() {
        let reply = CandidateReply {
            text: Some("thinking...".into()),
            calls: vec![ProposedCall::new("send_message", r#"{"text": "Hi!"}"#)],
        };
        assert_eq!(
            validate(&reply),
            ValidationOutcome::Valid(CapabilityCall::SendMessage { text: "Hi!".into() })
        );
    }
}
