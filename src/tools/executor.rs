//! 服务执行器
//!
//! 持有 ServiceRegistry 与全局超时，call(service, tool, args) 在超时内调用对应服务，
//! 超时或失败时转为 ServiceError；每次调用输出结构化审计日志（JSON）。

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::timeout;

use crate::tools::{CapabilityRegistry, ServiceError, ServiceInfo, ServiceRegistry};

/// 服务执行器：对每次调用施加超时，并将结果映射为 ServiceError
pub struct ServiceExecutor {
    registry: ServiceRegistry,
    timeout: Duration,
}

impl ServiceExecutor {
    pub fn new(registry: ServiceRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }
}

#[async_trait]
impl CapabilityRegistry for ServiceExecutor {
    async fn call(
        &self,
        service_name: &str,
        tool_name: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<String, ServiceError> {
        if service_name.trim().is_empty() {
            return Err(ServiceError::NotSpecified);
        }
        let service = self
            .registry
            .get(service_name)
            .ok_or_else(|| ServiceError::UnknownService {
                name: service_name.to_string(),
                available: self.registry.service_names(),
            })?;

        let start = Instant::now();
        let result = timeout(self.timeout, service.call(tool_name, args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "service_audit",
            "service": service_name,
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(args),
        });
        tracing::info!(audit = %audit.to_string(), "service");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(message)) => Err(ServiceError::Failed {
                service: service_name.to_string(),
                tool: tool_name.to_string(),
                message,
            }),
            Err(_) => Err(ServiceError::Timeout {
                service: service_name.to_string(),
                tool: tool_name.to_string(),
            }),
        }
    }

    fn services(&self) -> Vec<ServiceInfo> {
        self.registry.infos()
    }
}

fn args_preview(args: &BTreeMap<String, String>) -> String {
    let s = serde_json::to_string(args).unwrap_or_default();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{EchoService, Service, ToolSpec};

    struct SlowService;

    #[async_trait]
    impl Service for SlowService {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "never answers in time"
        }

        fn tools(&self) -> Vec<ToolSpec> {
            vec![ToolSpec::new("wait", "sleeps")]
        }

        async fn call(&self, _tool: &str, _args: &BTreeMap<String, String>) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    fn executor() -> ServiceExecutor {
        let mut registry = ServiceRegistry::new();
        registry.register(EchoService);
        registry.register(SlowService);
        ServiceExecutor::new(registry, 30)
    }

    #[tokio::test]
    async fn test_call_known_service() {
        let args = BTreeMap::from([("text".to_string(), "hi".to_string())]);
        let out = executor().call("echo", "echo", &args).await;
        assert_eq!(out, Ok("hi".to_string()));
    }

    #[tokio::test]
    async fn test_missing_service_name() {
        let out = executor().call("  ", "echo", &BTreeMap::new()).await;
        assert_eq!(out, Err(ServiceError::NotSpecified));
    }

    #[tokio::test]
    async fn test_unknown_service_lists_available() {
        let out = executor().call("weather", "weather", &BTreeMap::new()).await;
        match out {
            Err(ServiceError::UnknownService { name, available }) => {
                assert_eq!(name, "weather");
                assert_eq!(available, vec!["echo", "slow"]);
            }
            other => panic!("Expected UnknownService, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failure() {
        let out = executor().call("echo", "shout", &BTreeMap::new()).await;
        assert!(matches!(out, Err(ServiceError::Failed { .. })));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut registry = ServiceRegistry::new();
        registry.register(SlowService);
        let mut exec = ServiceExecutor::new(registry, 0);
        exec.timeout = Duration::from_millis(20);
        let out = exec.call("slow", "wait", &BTreeMap::new()).await;
        assert!(matches!(out, Err(ServiceError::Timeout { .. })));
    }
}
