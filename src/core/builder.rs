//! 运行时构建器：统一创建各共享组件
//!
//! RuntimeBuilder 根据配置组装 LLM 工厂、主对话传输、服务注册表、persona 注册表、
//! 执行器表、会话存储、调度器、路由器与主循环；Bootstrap 保证只构建一次。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::agents::{
    AgentDispatcher, CustomExecutor, ExecutionTable, PersonaRegistry, StaticPersonaRegistry,
};
use crate::config::AppConfig;
use crate::llm::{
    CompletionRequest, Endpoint, LlmFactory, MockFactory, OpenAiFactory, Transport,
};
use crate::memory::AgentSessionStore;
use crate::react::{InvocationRouter, ToolLoop};
use crate::tools::{
    CapabilityRegistry, ClockService, EchoService, Service, ServiceExecutor, ServiceRegistry,
};

/// 构建完成的运行时：所有组件以 Arc 共享
pub struct Runtime {
    pub config: AppConfig,
    pub transport: Arc<Transport>,
    pub services: Arc<ServiceExecutor>,
    pub personas: Arc<StaticPersonaRegistry>,
    pub sessions: Arc<AgentSessionStore>,
    pub dispatcher: Arc<AgentDispatcher>,
    pub router: Arc<InvocationRouter>,
    pub tool_loop: Arc<ToolLoop>,
}

#[derive(Clone)]
pub struct RuntimeBuilder {
    config: AppConfig,
    factory: Option<Arc<dyn LlmFactory>>,
    executors: ExecutionTable,
    extra_services: ServiceRegistry,
}

impl RuntimeBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            factory: None,
            executors: ExecutionTable::new(),
            extra_services: ServiceRegistry::new(),
        }
    }

    /// 指定 LLM 工厂（测试时注入脚本客户端）；未指定时按 API Key 选择 OpenAI 兼容或 Mock
    pub fn with_factory(mut self, factory: Arc<dyn LlmFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// 注册自定义执行器，供 persona 的 execution 字段引用
    pub fn with_executor(mut self, id: &str, executor: impl CustomExecutor + 'static) -> Self {
        self.executors.register(id, executor);
        self
    }

    /// 追加内置服务之外的服务
    pub fn with_service(mut self, service: impl Service + 'static) -> Self {
        self.extra_services.register(service);
        self
    }

    fn select_factory(&self) -> Arc<dyn LlmFactory> {
        if let Some(f) = &self.factory {
            return f.clone();
        }
        if self.config.llm.resolved_api_key().is_some() {
            tracing::info!(
                "Using {} model {} via OpenAI-compatible API",
                self.config.llm.provider,
                self.config.llm.model
            );
            Arc::new(OpenAiFactory)
        } else {
            tracing::warn!("No API key configured, using mock LLM client");
            Arc::new(MockFactory)
        }
    }

    /// 内置服务按 [services].enabled 注册，再合并额外服务
    fn build_service_registry(&self) -> ServiceRegistry {
        let mut registry = ServiceRegistry::new();
        for name in &self.config.services.enabled {
            match name.as_str() {
                "echo" => registry.register(EchoService),
                "clock" => registry.register(ClockService),
                other => tracing::warn!("Unknown built-in service '{}' in config, skipped", other),
            }
        }
        for name in self.extra_services.service_names() {
            if let Some(service) = self.extra_services.get(&name) {
                registry.register_shared(service);
            }
        }
        registry
    }

    fn build_personas(&self, endpoint: &Endpoint) -> StaticPersonaRegistry {
        let mut personas = StaticPersonaRegistry::new(self.config.agents.personas.clone());
        if let Some(dir) = &self.config.agents.persona_dir {
            if let Err(e) = personas.load_dir(dir) {
                tracing::warn!("Failed to read persona dir {:?}: {}", dir, e);
            }
        }
        personas.fill_defaults(endpoint, &self.config.llm.model);
        personas
    }

    pub fn build(&self) -> Runtime {
        let llm = &self.config.llm;
        let factory = self.select_factory();
        let endpoint = Endpoint {
            base_url: llm.base_url.clone(),
            api_key: llm.resolved_api_key(),
        };

        let transport = Arc::new(Transport::new(
            factory.clone(),
            endpoint.clone(),
            CompletionRequest::new(&llm.model, llm.temperature, llm.max_tokens),
        ));

        let services = Arc::new(ServiceExecutor::new(
            self.build_service_registry(),
            self.config.services.timeout_secs,
        ));

        let personas = Arc::new(self.build_personas(&endpoint));
        let agents = &self.config.agents;
        let sessions = Arc::new(AgentSessionStore::new(
            agents.max_history_rounds,
            Duration::from_secs(agents.context_ttl_hours * 3600),
        ));

        let dispatcher = Arc::new(AgentDispatcher::new(
            personas.clone() as Arc<dyn PersonaRegistry>,
            Arc::new(self.executors.clone()),
            sessions.clone(),
            factory,
        ));
        let router = Arc::new(InvocationRouter::new(
            services.clone() as Arc<dyn CapabilityRegistry>,
            dispatcher.clone(),
        ));
        let tool_loop = Arc::new(ToolLoop::new(
            transport.clone(),
            router.clone(),
            self.config.tool_loop.clone(),
        ));

        tracing::info!(
            "Runtime ready: {} services, {} personas",
            services.registry().len(),
            personas.len()
        );

        Runtime {
            config: self.config.clone(),
            transport,
            services,
            personas,
            sessions,
            dispatcher,
            router,
            tool_loop,
        }
    }
}

/// 只构建一次的运行时入口；重复调用 runtime() 返回同一实例
pub struct Bootstrap {
    builder: RuntimeBuilder,
    runtime: OnceLock<Arc<Runtime>>,
}

impl Bootstrap {
    pub fn new(builder: RuntimeBuilder) -> Self {
        Self {
            builder,
            runtime: OnceLock::new(),
        }
    }

    pub fn runtime(&self) -> Arc<Runtime> {
        self.runtime
            .get_or_init(|| Arc::new(self.builder.build()))
            .clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;

    use super::*;
    use crate::agents::PersonaConfig;
    use crate::tools::ToolSpec;

    struct Weather;

    #[async_trait]
    impl Service for Weather {
        fn name(&self) -> &str {
            "weather"
        }

        fn description(&self) -> &str {
            "Weather lookup"
        }

        fn tools(&self) -> Vec<ToolSpec> {
            vec![ToolSpec::new("weather", "Current weather for a city")]
        }

        async fn call(&self, _tool: &str, _args: &BTreeMap<String, String>) -> Result<String, String> {
            Ok("Sunny, 20C".to_string())
        }
    }

    fn config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.llm.api_key = Some("sk-test".into());
        cfg.agents.personas = vec![PersonaConfig::new("helper")];
        cfg
    }

    #[test]
    fn test_bootstrap_builds_once() {
        let bootstrap = Bootstrap::new(RuntimeBuilder::new(config()).with_factory(Arc::new(MockFactory)));
        assert!(!bootstrap.is_initialized());
        let a = bootstrap.runtime();
        let b = bootstrap.runtime();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(bootstrap.is_initialized());
    }

    #[test]
    fn test_builder_registers_services_and_fills_persona_defaults() {
        let runtime = RuntimeBuilder::new(config())
            .with_factory(Arc::new(MockFactory))
            .with_service(Weather)
            .build();

        assert_eq!(
            runtime.services.registry().service_names(),
            vec!["clock", "echo", "weather"]
        );
        let helper = runtime.personas.resolve("helper").unwrap();
        assert_eq!(helper.api_key.as_deref(), Some("sk-test"));
        assert_eq!(helper.model_id, "deepseek-chat");
        assert_eq!(runtime.sessions.max_messages(), 14);
    }

    #[test]
    fn test_unknown_builtin_service_skipped() {
        let mut cfg = config();
        cfg.services.enabled = vec!["echo".into(), "teleport".into()];
        let runtime = RuntimeBuilder::new(cfg)
            .with_factory(Arc::new(MockFactory))
            .build();
        assert_eq!(runtime.services.registry().service_names(), vec!["echo"]);
    }
}
