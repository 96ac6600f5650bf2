//! 会话记录导出
//!
//! 会话结束后把完整 Transcript 写成 JSON 文件，便于事后检查模型与能力调用的往来（可选使用）。

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::memory::{Transcript, Turn};

/// 单文件 JSON 导出
#[derive(Debug)]
pub struct TranscriptPersistence {
    path: PathBuf,
}

#[derive(Serialize)]
struct ExportedTranscript<'a> {
    exported_at: DateTime<Utc>,
    outcome: &'a str,
    turns: &'a [Turn],
}

impl TranscriptPersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// 写入导出文件；父目录不存在时自动创建，已存在的文件被覆盖
    pub fn save(&self, transcript: &Transcript, outcome: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let doc = ExportedTranscript {
            exported_at: Utc::now(),
            outcome,
            turns: transcript.turns(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&doc)?)?;
        Ok(())
    }
}
