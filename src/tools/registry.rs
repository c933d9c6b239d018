//! 服务注册表
//!
//! 每个服务实现 Service trait（name / description / tools / call），一个服务可提供多个工具；
//! ServiceRegistry 按服务名注册与查找，ServiceExecutor 在调用时加超时并统一转 ServiceError。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// 工具说明（供 prompt 列出调用格式）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// 示例参数，按顺序渲染为调用块中的参数行
    pub example_args: Vec<(String, String)>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            example_args: Vec::new(),
        }
    }

    pub fn with_example(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.example_args.push((key.into(), value.into()));
        self
    }
}

/// 服务说明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub description: String,
    pub tools: Vec<ToolSpec>,
}

/// 服务调用错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("service not specified")]
    NotSpecified,

    #[error("unknown service '{name}' (available: {})", .available.join(", "))]
    UnknownService { name: String, available: Vec<String> },

    #[error("{service}.{tool} failed: {message}")]
    Failed {
        service: String,
        tool: String,
        message: String,
    },

    #[error("{service}.{tool} timed out")]
    Timeout { service: String, tool: String },
}

/// 服务 trait：名称、描述、工具列表、异步执行（参数均为原始字符串）
#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn tools(&self) -> Vec<ToolSpec>;

    async fn call(&self, tool_name: &str, args: &BTreeMap<String, String>) -> Result<String, String>;
}

/// 能力注册表适配接口：路由器只依赖它
#[async_trait]
pub trait CapabilityRegistry: Send + Sync {
    async fn call(
        &self,
        service_name: &str,
        tool_name: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<String, ServiceError>;

    /// 可用服务（用于 prompt），默认空
    fn services(&self) -> Vec<ServiceInfo> {
        Vec::new()
    }
}

/// 服务注册表：按名称存储 Arc<dyn Service>，名称有序以保证列表稳定
#[derive(Default, Clone)]
pub struct ServiceRegistry {
    services: BTreeMap<String, Arc<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: impl Service + 'static) {
        self.register_shared(Arc::new(service));
    }

    pub fn register_shared(&mut self, service: Arc<dyn Service>) {
        let name = service.name().to_string();
        if self.services.insert(name.clone(), service).is_some() {
            tracing::warn!("Service '{}' registered twice, keeping the latest", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.get(name).cloned()
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    pub fn infos(&self) -> Vec<ServiceInfo> {
        self.services
            .values()
            .map(|s| ServiceInfo {
                name: s.name().to_string(),
                description: s.description().to_string(),
                tools: s.tools(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ClockService, EchoService};

    #[test]
    fn test_register_and_list_sorted() {
        let mut registry = ServiceRegistry::new();
        registry.register(EchoService);
        registry.register(ClockService);
        assert_eq!(registry.service_names(), vec!["clock", "echo"]);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("weather").is_none());
    }

    #[test]
    fn test_infos_include_tools() {
        let mut registry = ServiceRegistry::new();
        registry.register(EchoService);
        let infos = registry.infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].tools[0].name, "echo");
    }

    #[test]
    fn test_unknown_service_message() {
        let err = ServiceError::UnknownService {
            name: "weather".into(),
            available: vec!["clock".into(), "echo".into()],
        };
        assert_eq!(
            err.to_string(),
            "unknown service 'weather' (available: clock, echo)"
        );
    }
}
