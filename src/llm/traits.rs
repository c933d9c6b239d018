//! LLM 客户端抽象
//!
//! 所有后端实现 LlmClient::complete（整轮非流式）；LlmFactory 按端点创建客户端，
//! 用于主对话的「连接已关闭后重建」以及每个 persona 各自的端点。

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;

/// 单次补全的模型与生成参数
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_tokens,
        }
    }
}

/// 传输层错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// 底层连接句柄已关闭；重建客户端后可重试一次
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl LlmError {
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, LlmError::ConnectionClosed(_))
    }
}

/// LLM 客户端 trait：整轮补全
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        request: &CompletionRequest,
    ) -> Result<String, LlmError>;
}

/// 端点：base_url + api_key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl Endpoint {
    pub fn new(base_url: Option<&str>, api_key: Option<&str>) -> Self {
        Self {
            base_url: base_url.map(String::from),
            api_key: api_key.map(String::from),
        }
    }
}

/// 客户端工厂：按端点创建 LlmClient
pub trait LlmFactory: Send + Sync {
    fn create(&self, endpoint: &Endpoint) -> Arc<dyn LlmClient>;
}
