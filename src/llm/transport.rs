//! 主对话传输：持有当前客户端，遇到「连接已关闭」时用工厂重建一次并重试同一请求

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::llm::{CompletionRequest, Endpoint, LlmClient, LlmError, LlmFactory};
use crate::memory::Message;

pub struct Transport {
    factory: Arc<dyn LlmFactory>,
    endpoint: Endpoint,
    request: CompletionRequest,
    client: RwLock<Arc<dyn LlmClient>>,
    recreated: AtomicUsize,
}

impl Transport {
    pub fn new(factory: Arc<dyn LlmFactory>, endpoint: Endpoint, request: CompletionRequest) -> Self {
        let client = factory.create(&endpoint);
        Self {
            factory,
            endpoint,
            request,
            client: RwLock::new(client),
            recreated: AtomicUsize::new(0),
        }
    }

    /// 累计重建客户端次数
    pub fn recreations(&self) -> usize {
        self.recreated.load(Ordering::SeqCst)
    }

    /// 用当前客户端补全；ConnectionClosed 时重建客户端并重试一次，其余错误直接返回
    pub async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let client = self.client.read().await.clone();
        match client.complete(messages, &self.request).await {
            Err(e) if e.is_connection_closed() => {
                tracing::debug!("LLM connection closed ({}), recreating client and retrying", e);
                let fresh = self.factory.create(&self.endpoint);
                *self.client.write().await = fresh.clone();
                self.recreated.fetch_add(1, Ordering::SeqCst);
                fresh.complete(messages, &self.request).await
            }
            other => other,
        }
    }
}
