//! LLM 层：客户端抽象、OpenAI 兼容实现、Mock、带重建重试的主对话传输

pub mod mock;
pub mod openai;
pub mod traits;
pub mod transport;

pub use mock::{MockFactory, MockLlmClient, ScriptedFactory, ScriptedLlmClient};
pub use openai::{OpenAiClient, OpenAiFactory, DEFAULT_BASE_URL};
pub use traits::{CompletionRequest, Endpoint, LlmClient, LlmError, LlmFactory};
pub use transport::Transport;
