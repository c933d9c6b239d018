//! 记忆层：消息类型、对话滚动窗口、persona 会话存储（均为内存态）

pub mod agent_sessions;
pub mod conversation;

pub use agent_sessions::{AgentSession, AgentSessionStore};
pub use conversation::{ConversationMemory, Message, Role};
