//! 能力声明与参数 Schema（schemars 自动生成参数 Schema）
//!
//! 发送给模型的声明由 CapabilityKind::KNOWN 生成，与分发器匹配的集合是同一份枚举。

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::memory::AgentMemoryState;
use crate::tools::CapabilityKind;

/// 单个能力的声明：名称、描述、参数 JSON Schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// update_memory 的参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateMemoryArgs {
    pub state: AgentMemoryState,
}

/// send_message 的参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SendMessageArgs {
    #[schemars(description = "Text to display to the user")]
    pub text: String,
}

/// 为参数类型生成内联（无 $ref）的对象 Schema，去掉 $schema / title
pub fn args_schema<T: JsonSchema>() -> Value {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
        s.meta_schema = None;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();
    let mut value = serde_json::to_value(root).unwrap_or_else(|_| empty_schema());
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("definitions");
    }
    value
}

/// 无参数能力的 Schema
pub fn empty_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

impl CapabilityKind {
    /// 供模型阅读的能力描述
    pub fn description(&self) -> &'static str {
        match self {
            CapabilityKind::GetMemory => "Retrieve the persistent agent state as a JSON object.",
            CapabilityKind::UpdateMemory => {
                "Persist the provided agent state. The state object replaces the stored state entirely."
            }
            CapabilityKind::SendMessage => "Display a message to the user.",
            CapabilityKind::ReceiveResponse => "Block until the user provides input.",
            CapabilityKind::Terminate => {
                "Signal the orchestrator to terminate the conversation and exit."
            }
            CapabilityKind::Unrecognized(_) => "",
        }
    }

    pub fn parameters_schema(&self) -> Value {
        match self {
            CapabilityKind::UpdateMemory => args_schema::<UpdateMemoryArgs>(),
            CapabilityKind::SendMessage => args_schema::<SendMessageArgs>(),
            _ => empty_schema(),
        }
    }
}

/// 会话内固定的能力声明列表
pub fn capability_descriptors() -> Vec<CapabilityDescriptor> {
    CapabilityKind::KNOWN
        .iter()
        .map(|kind| CapabilityDescriptor {
            name: kind.name().to_string(),
            description: kind.description().to_string(),
            parameters: kind.parameters_schema(),
        })
        .collect()
}
