//! Bicameral - 单智能体编排器
//!
//! 模块划分：
//! - **agent**: 会话装配（配置 -> 模型客户端 / 状态存储 / 能力注册表 / 编排器）
//! - **channel**: 用户通道（stdin / stdout）
//! - **config**: 应用配置加载（TOML + 环境变量）与会话配置
//! - **core**: 错误、重试策略、会话状态、主控循环
//! - **llm**: 模型客户端抽象与实现（OpenAI 兼容 / Scripted）
//! - **memory**: Agent 持久化状态、会话记录与导出
//! - **observability**: tracing 日志初始化
//! - **tools**: 能力声明、回复校验与分发

pub mod agent;
pub mod channel;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod tools;
