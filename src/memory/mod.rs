//! 记忆层：Agent 持久化状态、会话记录、会话导出

pub mod persistence;
pub mod store;
pub mod transcript;

pub use persistence::TranscriptPersistence;
pub use store::{AgentMemoryState, MemoryStore, DEFAULT_MEMORY_FILE};
pub use transcript::{ProposedCall, Transcript, Turn};
