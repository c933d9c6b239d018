//! 后台监管：定期清理过期的 persona 会话
//!
//! 持有 CancellationToken 与清理任务句柄；shutdown() 取消并等待任务退出。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::memory::AgentSessionStore;

#[derive(Debug)]
pub struct Supervisor {
    cancel_token: CancellationToken,
    sweeper: Option<JoinHandle<()>>,
}

impl Supervisor {
    /// 启动清理任务：每隔 period 执行一次 sweep，第一次在 period 之后
    pub fn start(sessions: Arc<AgentSessionStore>, period: Duration) -> Self {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let period = period.max(Duration::from_millis(1));

        let sweeper = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = sessions.sweep().await;
                        if removed > 0 {
                            tracing::info!("Removed {} expired agent sessions", removed);
                        }
                    }
                }
            }
            tracing::debug!("session sweeper stopped");
        });

        Self {
            cancel_token,
            sweeper: Some(sweeper),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn is_running(&self) -> bool {
        self.sweeper.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// 取消清理任务并等待其退出
    pub async fn shutdown(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.sweeper.take() {
            if let Err(e) = handle.await {
                tracing::warn!("session sweeper ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweeper_removes_expired_sessions() {
        let store = Arc::new(AgentSessionStore::new(7, Duration::from_millis(20)));
        store.record("helper", "s1", &[], "q", "a").await;
        assert_eq!(store.session_count().await, 1);

        let mut supervisor = Supervisor::start(store.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(store.session_count().await, 0);
        assert_eq!(store.persona_count().await, 0);
        supervisor.shutdown().await;
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let store = Arc::new(AgentSessionStore::default());
        let mut supervisor = Supervisor::start(store, Duration::from_secs(3600));
        assert!(supervisor.is_running());
        supervisor.shutdown().await;
        assert!(supervisor.cancel_token().is_cancelled());
        assert!(!supervisor.is_running());
    }
}
