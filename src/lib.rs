//! Weave - 文本内嵌工具调用的对话编排
//!
//! 模块划分：
//! - **agents**: persona 配置、自定义执行器、占位符替换与 Agent 调度
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **conversation**: 对话前端（系统提示词、滚动窗口、回合超时）
//! - **core**: 错误类型、运行时构建、后台会话清理
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）及带重建重试的传输
//! - **memory**: 主对话滚动窗口与 persona 会话存储
//! - **react**: 调用块解析、路由与主循环
//! - **tools**: 服务注册表与执行器（echo、clock）

pub mod agents;
pub mod config;
pub mod conversation;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use conversation::{Conversation, Turn};
