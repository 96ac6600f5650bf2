//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）。能力声明以 `tools`（type=function）发送，
//! 会话记录映射为 system / assistant / tool 消息。客户端关闭了 async_openai 内置的退避重试：
//! 每次 complete 恰好一次 HTTP 往返，失败原样上报给编排器。

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionTools, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse, FunctionCall, FunctionObjectArgs,
    ToolChoiceOptions,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{CandidateReply, LlmError, ModelClient, TokenUsage};
use crate::memory::{ProposedCall, Transcript, Turn};
use crate::tools::CapabilityDescriptor;

/// 默认模型
pub const DEFAULT_MODEL: &str = "gpt-4o";

fn build_error(e: OpenAIError) -> LlmError {
    LlmError::Request(format!("build request: {e}"))
}

/// 会话记录 -> API 消息。缺少 id 的调用按位置生成 `call_{n}`，其后的结果消息沿用同一 id。
pub(crate) fn to_openai_messages(transcript: &Transcript) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    let mut pending_id: Option<String> = None;
    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(transcript.len());

    for (i, turn) in transcript.turns().iter().enumerate() {
        let message: ChatCompletionRequestMessage = match turn {
            Turn::System { text } => ChatCompletionRequestSystemMessageArgs::default()
                .content(text.clone())
                .build()
                .map_err(build_error)?
                .into(),
            Turn::Assistant { text, call } => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if let Some(text) = text {
                    args.content(text.clone());
                }
                if let Some(c) = call {
                    let id = c.id.clone().unwrap_or_else(|| format!("call_{i}"));
                    pending_id = Some(id.clone());
                    args.tool_calls(vec![ChatCompletionMessageToolCalls::Function(
                        ChatCompletionMessageToolCall {
                            id,
                            function: FunctionCall {
                                name: c.name.clone(),
                                arguments: c.raw_arguments.clone(),
                            },
                        },
                    )]);
                }
                args.build().map_err(build_error)?.into()
            }
            Turn::CapabilityResult {
                call_id, payload, ..
            } => {
                let tool_call_id = call_id
                    .clone()
                    .or_else(|| pending_id.take())
                    .unwrap_or_else(|| format!("call_{i}"));
                ChatCompletionRequestToolMessageArgs::default()
                    .content(payload.to_string())
                    .tool_call_id(tool_call_id)
                    .build()
                    .map_err(build_error)?
                    .into()
            }
        };
        messages.push(message);
    }
    Ok(messages)
}

pub(crate) fn to_openai_tools(capabilities: &[CapabilityDescriptor]) -> Result<Vec<ChatCompletionTools>, LlmError> {
    capabilities
        .iter()
        .map(|d| {
            let function = FunctionObjectArgs::default()
                .name(d.name.clone())
                .description(d.description.clone())
                .parameters(d.parameters.clone())
                .build()
                .map_err(build_error)?;
            Ok(ChatCompletionTools::Function(ChatCompletionTool { function }))
        })
        .collect()
}

/// 单次请求：全部能力声明、由模型自行选择、一次最多一个调用
pub(crate) fn build_request(
    model: &str,
    transcript: &Transcript,
    capabilities: &[CapabilityDescriptor],
) -> Result<CreateChatCompletionRequest, LlmError> {
    CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(to_openai_messages(transcript)?)
        .tools(to_openai_tools(capabilities)?)
        .tool_choice(ChatCompletionToolChoiceOption::Mode(ToolChoiceOptions::Auto))
        .parallel_tool_calls(false)
        .build()
        .map_err(build_error)
}

/// 取首个 choice 转为 CandidateReply；没有 choice 视为服务端失败
#[allow(deprecated)]
pub(crate) fn reply_from_response(response: CreateChatCompletionResponse) -> Result<CandidateReply, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyResponse)?;
    let message = choice.message;

    let mut calls: Vec<ProposedCall> = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| match tc {
            ChatCompletionMessageToolCalls::Function(f) => ProposedCall {
                id: Some(f.id).filter(|id| !id.is_empty()),
                name: f.function.name,
                raw_arguments: f.function.arguments,
            },
            // 自定义工具不在能力集合内，按名称交给校验判为未知
            ChatCompletionMessageToolCalls::Custom(c) => ProposedCall {
                id: Some(c.id).filter(|id| !id.is_empty()),
                name: c.custom_tool.name,
                raw_arguments: c.custom_tool.input,
            },
        })
        .collect();
    // 旧版 functions 接口的单个调用
    if let Some(fc) = message.function_call {
        calls.push(ProposedCall::new(fc.name, fc.arguments));
    }

    Ok(CandidateReply {
        text: message.content.filter(|c| !c.is_empty()),
        calls,
    })
}

/// 不做任何自动重试的退避配置：首次失败即返回
fn no_retry_backoff() -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoff {
        max_elapsed_time: Some(Duration::ZERO),
        ..Default::default()
    }
}

/// OpenAI 兼容客户端：持有 Client、model 名与单次请求超时
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str, timeout_secs: u64) -> Self {
        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config).with_backoff(no_retry_backoff()),
            model: model.to_string(),
            timeout: Duration::from_secs(timeout_secs),
            usage: TokenUsage::default(),
        }
    }
}

fn map_openai_error(e: OpenAIError) -> LlmError {
    match e {
        OpenAIError::ApiError(api) => LlmError::Api(api.message),
        other => LlmError::Request(other.to_string()),
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(
        &self,
        transcript: &Transcript,
        capabilities: &[CapabilityDescriptor],
    ) -> Result<CandidateReply, LlmError> {
        let request = build_request(&self.model, transcript, capabilities)?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))?
            .map_err(map_openai_error)?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "token usage"
            );
        }

        reply_from_response(response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::capability_descriptors;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn response(message: Value) -> CreateChatCompletionResponse {
        serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 0,
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": message, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        }))
        .unwrap()
    }

    #[test]
    fn test_transcript_maps_to_chat_messages() {
        let mut t = Transcript::new("sys");
        t.push_assistant(None, Some(ProposedCall::new("get_memory", "{}").with_id("call_abc")));
        t.push_result("get_memory", Some("call_abc".into()), json!({"step": 0}));
        t.push_system("retry please");

        let wire = serde_json::to_value(to_openai_messages(&t).unwrap()).unwrap();
        assert_eq!(
            wire,
            json!([
                {"role": "system", "content": "sys"},
                {"role": "assistant", "tool_calls": [
                    {"id": "call_abc", "type": "function", "function": {"name": "get_memory", "arguments": "{}"}}
                ]},
                {"role": "tool", "tool_call_id": "call_abc", "content": "{\"step\":0}"},
                {"role": "system", "content": "retry please"}
            ])
        );
    }

    #[test]
    fn test_missing_call_id_is_synthesized_and_reused() {
        let mut t = Transcript::new("sys");
        t.push_assistant(Some("ok".into()), Some(ProposedCall::new("send_message", r#"{"text":"hi"}"#)));
        t.push_result("send_message", None, json!({"status": "sent"}));

        let wire = serde_json::to_value(to_openai_messages(&t).unwrap()).unwrap();
        assert_eq!(wire[1]["content"], "ok");
        assert_eq!(wire[1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(wire[2]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_request_declares_tools_with_auto_choice() {
        let request = build_request("gpt-4o", &Transcript::new("sys"), &capability_descriptors()).unwrap();
        let v = serde_json::to_value(&request).unwrap();

        assert_eq!(v["model"], "gpt-4o");
        assert_eq!(v["tool_choice"], "auto");
        assert_eq!(v["parallel_tool_calls"], false);
        let tools = v["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 5);
        assert_eq!(tools[0]["type"], "function");
        assert_eq!(tools[0]["function"]["name"], "get_memory");
        assert_eq!(tools[2]["function"]["parameters"]["required"], json!(["text"]));
    }

    #[test]
    fn test_response_with_tool_call() {
        let reply = reply_from_response(response(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{"id": "c1", "type": "function",
                "function": {"name": "send_message", "arguments": "{\"text\":\"hi\"}"}}]
        })))
        .unwrap();

        assert_eq!(reply.text, None);
        assert_eq!(
            reply.calls,
            vec![ProposedCall::new("send_message", r#"{"text":"hi"}"#).with_id("c1")]
        );
    }

    #[test]
    fn test_response_with_legacy_function_call() {
        let reply = reply_from_response(response(json!({
            "role": "assistant",
            "content": "",
            "function_call": {"name": "terminate", "arguments": ""}
        })))
        .unwrap();

        assert_eq!(reply.text, None);
        assert_eq!(reply.calls, vec![ProposedCall::new("terminate", "")]);
    }

    #[test]
    fn test_response_without_choices_is_error() {
        let mut r = response(json!({"role": "assistant", "content": "hi"}));
        r.choices.clear();
        assert_eq!(reply_from_response(r), Err(LlmError::EmptyResponse));
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return;
                }
            }
        }
    }

    /// 每个请求都回 500，并统计收到的请求数
    async fn serve_server_errors(listener: TcpListener, hits: Arc<AtomicUsize>) {
        while let Ok((mut socket, _)) = listener.accept().await {
            hits.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                read_request(&mut socket).await;
                let body = r#"{"error":{"message":"upstream exploded","type":"server_error"}}"#;
                let reply = format!(
                    "HTTP/1.1 500 Internal Server Error\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    }

    #[tokio::test]
    async fn test_server_error_returned_after_single_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        tokio::spawn(serve_server_errors(listener, hits.clone()));

        let client = OpenAiClient::new(Some(&format!("http://{addr}/v1")), "gpt-4o", "sk-test", 10);
        let result = client
            .complete(&Transcript::new("sys"), &capability_descriptors())
            .await;

        assert!(
            matches!(&result, Err(LlmError::Api(msg)) if msg.contains("upstream exploded")),
            "unexpected result: {result:?}"
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(client.token_usage(), (0, 0, 0));
    }
}
