//! 用户通道
//!
//! send 向用户输出一段文本；receive 阻塞直到读到一行用户输入（去掉行尾换行）。
//! 默认实现基于 stdin / stdout，测试中可替换为脚本化实现。

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

use crate::core::AgentError;

/// 读取用户输入前显示的提示符
pub const INPUT_PROMPT: &str = "> ";

#[async_trait]
pub trait UserChannel: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), AgentError>;

    async fn receive(&self) -> Result<String, AgentError>;
}

/// 终端通道：stdout 输出，stdin 按行读取
pub struct StdioChannel {
    stdin: Mutex<BufReader<Stdin>>,
}

impl StdioChannel {
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for StdioChannel {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_stdout(bytes: &[u8]) -> Result<(), AgentError> {
    let mut out = tokio::io::stdout();
    out.write_all(bytes)
        .await
        .map_err(|e| AgentError::Channel(format!("stdout: {e}")))?;
    out.flush()
        .await
        .map_err(|e| AgentError::Channel(format!("stdout: {e}")))
}

#[async_trait]
impl UserChannel for StdioChannel {
    async fn send(&self, text: &str) -> Result<(), AgentError> {
        write_stdout(format!("{text}\n").as_bytes()).await
    }

    async fn receive(&self) -> Result<String, AgentError> {
        write_stdout(INPUT_PROMPT.as_bytes()).await?;
        let mut line = String::new();
        let n = self
            .stdin
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(|e| AgentError::Channel(format!("stdin: {e}")))?;
        if n == 0 {
            return Err(AgentError::Channel("stdin closed".to_string()));
        }
        Ok(strip_line_ending(&line).to_string())
    }
}

fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}
