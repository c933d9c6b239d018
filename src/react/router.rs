//! 调用路由
//!
//! 按出现顺序逐个执行：agent 交给 AgentDispatcher，service 去掉路由参数后交给 CapabilityRegistry。
//! 单个调用的失败转成该调用的结果文本，不影响其余调用。

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::agents::AgentDispatcher;
use crate::react::protocol::{Invocation, Target, KEY_AGENT_TYPE, KEY_SERVICE_NAME};
use crate::tools::CapabilityRegistry;

/// 多个结果之间的分隔符
pub const RESULT_SEPARATOR: &str = "\n\n---\n\n";

/// 单个调用的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    pub name: String,
    pub ok: bool,
    pub text: String,
}

impl InvocationOutcome {
    /// 带调用名称标题的结果块
    pub fn render(&self) -> String {
        if self.ok {
            format!("Result from tool \"{}\":\n{}", self.name, self.text)
        } else {
            format!("Result from tool \"{}\":\nError: {}", self.name, self.text)
        }
    }
}

pub struct InvocationRouter {
    registry: Arc<dyn CapabilityRegistry>,
    dispatcher: Arc<AgentDispatcher>,
}

impl InvocationRouter {
    pub fn new(registry: Arc<dyn CapabilityRegistry>, dispatcher: Arc<AgentDispatcher>) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    /// 执行单个调用
    pub async fn execute_one(&self, invocation: &Invocation) -> InvocationOutcome {
        let result = match &invocation.target {
            Target::Agent { persona, query } => self
                .dispatcher
                .call(persona, query, None)
                .await
                .map_err(|e| e.to_string()),
            Target::Service { service, tool } => {
                let args = service_arguments(&invocation.arguments);
                self.registry
                    .call(service, tool, &args)
                    .await
                    .map_err(|e| e.to_string())
            }
        };

        match result {
            Ok(text) => InvocationOutcome {
                name: invocation.name.clone(),
                ok: true,
                text,
            },
            Err(text) => {
                tracing::warn!("invocation '{}' failed: {}", invocation.name, text);
                InvocationOutcome {
                    name: invocation.name.clone(),
                    ok: false,
                    text,
                }
            }
        }
    }

    /// 依次执行全部调用，返回每个调用的结果
    pub async fn execute_each(&self, invocations: &[Invocation]) -> Vec<InvocationOutcome> {
        let mut outcomes = Vec::with_capacity(invocations.len());
        for invocation in invocations {
            outcomes.push(self.execute_one(invocation).await);
        }
        outcomes
    }

    /// 依次执行全部调用，返回拼接后的结果文本
    pub async fn execute(&self, invocations: &[Invocation]) -> String {
        join_outcomes(&self.execute_each(invocations).await)
    }
}

pub fn join_outcomes(outcomes: &[InvocationOutcome]) -> String {
    outcomes
        .iter()
        .map(InvocationOutcome::render)
        .collect::<Vec<_>>()
        .join(RESULT_SEPARATOR)
}

/// 去掉仅用于路由的参数；tool_name 保留给服务
fn service_arguments(arguments: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    arguments
        .iter()
        .filter(|(k, _)| k.as_str() != KEY_SERVICE_NAME && k.as_str() != KEY_AGENT_TYPE)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
