//! Mock LLM 客户端（用于测试与无 API Key 时的本地运行）
//!
//! - MockLlmClient：回显最后一条 User 消息，不含调用块，循环一轮即结束
//! - ScriptedLlmClient：按脚本依次返回预设结果，并记录每次收到的消息
//! - ScriptedFactory：按顺序交出预设客户端，记录创建次数

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::llm::{CompletionRequest, Endpoint, LlmClient, LlmError, LlmFactory};
use crate::memory::{Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        _request: &CompletionRequest,
    ) -> Result<String, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {}", last_user))
    }
}

/// 总是创建 MockLlmClient 的工厂
#[derive(Debug, Default)]
pub struct MockFactory;

impl LlmFactory for MockFactory {
    fn create(&self, _endpoint: &Endpoint) -> Arc<dyn LlmClient> {
        Arc::new(MockLlmClient)
    }
}

/// 脚本客户端：脚本耗尽后返回 fallback（若有），否则返回 Api 错误
#[derive(Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<Result<String, LlmError>>,
    received: Mutex<Vec<(Vec<Message>, CompletionRequest)>>,
}

impl ScriptedLlmClient {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    /// 每次都返回同一回复
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self {
            fallback: Some(Ok(reply.into())),
            ..Self::default()
        }
    }

    pub fn with_fallback(mut self, fallback: Result<String, LlmError>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn calls(&self) -> usize {
        self.received.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// 第 n 次调用收到的消息
    pub fn messages_at(&self, n: usize) -> Option<Vec<Message>> {
        self.received
            .lock()
            .ok()
            .and_then(|r| r.get(n).map(|(m, _)| m.clone()))
    }

    /// 第 n 次调用的请求参数
    pub fn request_at(&self, n: usize) -> Option<CompletionRequest> {
        self.received
            .lock()
            .ok()
            .and_then(|r| r.get(n).map(|(_, req)| req.clone()))
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        request: &CompletionRequest,
    ) -> Result<String, LlmError> {
        if let Ok(mut received) = self.received.lock() {
            received.push((messages.to_vec(), request.clone()));
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(reply) => reply,
            None => self
                .fallback
                .clone()
                .unwrap_or_else(|| Err(LlmError::Api("script exhausted".to_string()))),
        }
    }
}

/// 按顺序交出客户端；用完后重复最后一个
pub struct ScriptedFactory {
    clients: Vec<Arc<dyn LlmClient>>,
    created: AtomicUsize,
    endpoints: Mutex<Vec<Endpoint>>,
}

impl ScriptedFactory {
    pub fn new<C: LlmClient + 'static>(clients: Vec<Arc<C>>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|c| c as Arc<dyn LlmClient>)
                .collect(),
            created: AtomicUsize::new(0),
            endpoints: Mutex::new(Vec::new()),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl LlmFactory for ScriptedFactory {
    fn create(&self, endpoint: &Endpoint) -> Arc<dyn LlmClient> {
        if let Ok(mut endpoints) = self.endpoints.lock() {
            endpoints.push(endpoint.clone());
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        let idx = n.min(self.clients.len().saturating_sub(1));
        match self.clients.get(idx) {
            Some(client) => client.clone(),
            None => Arc::new(MockLlmClient),
        }
    }
}
