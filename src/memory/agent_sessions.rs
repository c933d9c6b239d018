//! Persona 会话存储
//!
//! 以 (persona, session_id) 为键保存多轮历史；超过 TTL 未使用的会话读取时视为不存在，
//! 只有成功调用后的写回才会创建或重建会话，
//! 由后台清理任务定期删除。整个嵌套映射由一把 RwLock 保护，每个操作在一次加锁内完成读-改-写。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::memory::Message;

/// 单个 persona 会话：历史（user/assistant 成对）+ 最后使用时间
#[derive(Debug, Clone)]
pub struct AgentSession {
    pub session_id: String,
    pub history: Vec<Message>,
    pub last_touched: Instant,
}

impl AgentSession {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            history: Vec::new(),
            last_touched: Instant::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_touched.elapsed() > ttl
    }
}

/// 会话存储：persona 名 -> (session_id -> AgentSession)
pub struct AgentSessionStore {
    sessions: RwLock<HashMap<String, HashMap<String, AgentSession>>>,
    /// 最大保留轮数，实际消息上限为 2 × max_history_rounds
    max_history_rounds: usize,
    ttl: Duration,
}

impl AgentSessionStore {
    pub fn new(max_history_rounds: usize, ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history_rounds,
            ttl,
        }
    }

    pub fn max_messages(&self) -> usize {
        self.max_history_rounds * 2
    }

    /// 只读获取会话历史；不存在或已过期时返回空，不创建会话
    pub async fn history(&self, persona: &str, session_id: &str) -> Vec<Message> {
        self.sessions
            .read()
            .await
            .get(persona)
            .and_then(|bucket| bucket.get(session_id))
            .filter(|s| !s.is_expired(self.ttl))
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    /// 成功调用后写回一轮 (user, assistant)，刷新时间戳并裁剪到上限
    ///
    /// `context` 是本次调用读取到的历史：会话仍有效时直接追加，
    /// 会话缺失或已在调用期间过期时以 `context` 重建，保证写回的历史包含调用所依赖的上下文。
    pub async fn record(
        &self,
        persona: &str,
        session_id: &str,
        context: &[Message],
        user: &str,
        assistant: &str,
    ) {
        let max_messages = self.max_messages();
        let mut sessions = self.sessions.write().await;
        let bucket = sessions.entry(persona.to_string()).or_default();
        let session = bucket
            .entry(session_id.to_string())
            .or_insert_with(|| AgentSession::new(session_id));
        if session.history.is_empty() || session.is_expired(self.ttl) {
            session.history = context.to_vec();
        }
        session.history.push(Message::user(user));
        session.history.push(Message::assistant(assistant));
        session.last_touched = Instant::now();
        if session.history.len() > max_messages {
            let excess = session.history.len() - max_messages;
            session.history.drain(..excess);
        }
    }

    /// 删除过期会话及空的 persona 桶，返回删除的会话数
    pub async fn sweep(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut removed = 0;
        sessions.retain(|persona, bucket| {
            bucket.retain(|session_id, session| {
                let expired = session.is_expired(self.ttl);
                if expired {
                    tracing::debug!(persona = %persona, session = %session_id, "expired agent session removed");
                    removed += 1;
                }
                !expired
            });
            !bucket.is_empty()
        });
        removed
    }

    /// 是否存在未过期的会话
    pub async fn contains(&self, persona: &str, session_id: &str) -> bool {
        self.sessions
            .read()
            .await
            .get(persona)
            .and_then(|bucket| bucket.get(session_id))
            .map(|s| !s.is_expired(self.ttl))
            .unwrap_or(false)
    }

    /// 当前保存的会话总数（含尚未清理的过期会话）
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.values().map(|b| b.len()).sum()
    }

    pub async fn persona_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for AgentSessionStore {
    fn default() -> Self {
        Self::new(7, Duration::from_secs(24 * 3600))
    }
}
