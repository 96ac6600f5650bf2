//! 会话记录（Transcript）
//!
//! 只追加的有序 Turn 序列：第一条恒为由 system prompt 构造的 SystemTurn，追加后的条目不可修改或删除。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 模型提出的函数调用（未校验）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedCall {
    /// 协议层的 tool call id，用于关联结果消息；部分后端可能不返回
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// 原始参数文本（应为 JSON 对象）
    #[serde(default)]
    pub raw_arguments: String,
}

impl ProposedCall {
    pub fn new(name: impl Into<String>, raw_arguments: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            raw_arguments: raw_arguments.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// 单条记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    System {
        text: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call: Option<ProposedCall>,
    },
    CapabilityResult {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        payload: Value,
    },
}

/// 只追加的会话记录
#[derive(Clone, Debug, Serialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// 以 system prompt 原文作为第一条记录
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::System {
                text: system_prompt.into(),
            }],
        }
    }

    pub fn push_system(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::System { text: text.into() });
    }

    pub fn push_assistant(&mut self, text: Option<String>, call: Option<ProposedCall>) {
        self.turns.push(Turn::Assistant { text, call });
    }

    pub fn push_result(&mut self, name: impl Into<String>, call_id: Option<String>, payload: Value) {
        self.turns.push(Turn::CapabilityResult {
            name: name.into(),
            call_id,
            payload,
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_turn_is_prompt_verbatim() {
        let prompt = "  You are a tutor.\n\nBe brief.  ";
        let t = Transcript::new(prompt);
        assert_eq!(t.len(), 1);
        assert_eq!(t.turns()[0], Turn::System { text: prompt.to_string() });
    }

    #[test]
    fn test_appends_keep_order() {
        let mut t = Transcript::new("p");
        let call = ProposedCall::new("get_memory", "{}").with_id("call_1");
        t.push_assistant(None, Some(call.clone()));
        t.push_result("get_memory", Some("call_1".into()), json!({"step": 0}));
        t.push_system("retry");

        assert_eq!(t.len(), 4);
        assert!(matches!(&t.turns()[1], Turn::Assistant { call: Some(c), .. } if *c == call));
        assert!(matches!(&t.turns()[2], Turn::CapabilityResult { name, .. } if name == "get_memory"));
        assert!(matches!(&t.turns()[3], Turn::System { text } if text == "retry"));
    }

    #[test]
    fn test_serialized_shape() {
        let mut t = Transcript::new("p");
        t.push_result("send_message", None, json!({"status": "sent"}));
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(
            v,
            json!({"turns": [
                {"kind": "system", "text": "p"},
                {"kind": "capability_result", "name": "send_message", "payload": {"status": "sent"}}
            ]})
        );
    }
}
