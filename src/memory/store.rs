//! Agent 状态存储
//!
//! 单文件 JSON（`{"step", "history", "complete"}`）；文件缺失或损坏时返回默认状态而不覆盖原文件，
//! 写入时整体替换（临时文件 + rename），读者永远看不到写了一半的内容。

use std::io::Write;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::core::AgentError;

/// 默认状态文件名（相对当前工作目录）
pub const DEFAULT_MEMORY_FILE: &str = "agent_state.json";

/// Agent 持久化状态；未知字段原样保留，缺失字段取默认值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Complete agent state. Replaces the stored state entirely.")]
pub struct AgentMemoryState {
    /// 当前步骤（非负整数）
    #[serde(default)]
    #[schemars(description = "Current step number")]
    pub step: u64,
    /// 历史记录，元素内容由模型自行决定
    #[serde(default)]
    #[schemars(description = "Ordered history records")]
    pub history: Vec<Value>,
    /// 任务是否完成
    #[serde(default)]
    #[schemars(description = "Whether the task is complete")]
    pub complete: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 状态存储：持有文件路径与「缺失时是否初始化」标志
#[derive(Debug, Clone)]
pub struct MemoryStore {
    path: PathBuf,
    init_if_missing: bool,
}

impl MemoryStore {
    pub fn new(path: impl AsRef<Path>, init_if_missing: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            init_if_missing,
        }
    }

    /// 读取状态
    ///
    /// - 文件不存在：返回默认状态；若开启初始化则先把默认状态写盘
    /// - 内容无法解析为预期结构：返回默认状态，不覆盖原文件
    pub fn read(&self) -> Result<AgentMemoryState, AgentError> {
        if !self.path.exists() {
            let state = AgentMemoryState::default();
            if self.init_if_missing {
                tracing::info!(path = %self.path.display(), "memory file missing, initializing");
                self.write(&state)?;
            }
            return Ok(state);
        }

        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "memory file unreadable, using default state");
                return Ok(AgentMemoryState::default());
            }
        };

        match serde_json::from_str::<AgentMemoryState>(&data) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "memory file corrupt, using default state");
                Ok(AgentMemoryState::default())
            }
        }
    }

    /// 整体写入状态；父目录不存在时自动创建
    pub fn write(&self, state: &AgentMemoryState) -> Result<(), AgentError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.storage_error(e))?;

        let data = serde_json::to_string(state)
            .map_err(|e| AgentError::Storage(format!("serialize state: {e}")))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| self.storage_error(e))?;
        tmp.write_all(data.as_bytes())
            .map_err(|e| self.storage_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.storage_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.storage_error(e.error))?;
        Ok(())
    }

    fn storage_error(&self, e: std::io::Error) -> AgentError {
        AgentError::Storage(format!("{}: {e}", self.path.display()))
    }
}
