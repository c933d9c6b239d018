//! 自定义执行器表
//!
//! Persona 配置中的 execution 字段是一个 ID，启动时在此表中注册对应实现；
//! 调用时按 ID 查表，查不到即明确报错。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

/// 自定义执行器：直接处理 query，不经过 LLM
#[async_trait]
pub trait CustomExecutor: Send + Sync {
    async fn execute(&self, query: &str) -> Result<String, String>;
}

#[derive(Default, Clone)]
pub struct ExecutionTable {
    executors: HashMap<String, Arc<dyn CustomExecutor>>,
}

impl ExecutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, executor: impl CustomExecutor + 'static) {
        self.executors.insert(id.into(), Arc::new(executor));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn CustomExecutor>> {
        self.executors.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.executors.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shout;

    #[async_trait]
    impl CustomExecutor for Shout {
        async fn execute(&self, query: &str) -> Result<String, String> {
            Ok(query.to_uppercase())
        }
    }

    #[tokio::test]
    async fn test_lookup_registered_executor() {
        let mut table = ExecutionTable::new();
        table.register("shout", Shout);
        let exec = table.get("shout").unwrap();
        assert_eq!(exec.execute("hi").await.unwrap(), "HI");
        assert!(table.get("whisper").is_none());
        assert_eq!(table.ids(), vec!["shout"]);
    }
}
