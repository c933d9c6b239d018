//! 系统提示词中的可用能力列表：每个服务工具附一个可直接复制的调用块，每个 Agent 附说明

use crate::agents::PersonaConfig;
use crate::react::protocol::{render_agent_call, render_service_call};
use crate::tools::ServiceInfo;

/// 生成服务与 Agent 列表；两者都为空时返回空字符串
pub fn capability_listing(services: &[ServiceInfo], personas: &[PersonaConfig]) -> String {
    let mut out = String::new();

    if !services.is_empty() {
        out.push_str("## Available services\n\n");
        for service in services {
            out.push_str(&format!("### {}: {}\n", service.name, service.description));
            for tool in &service.tools {
                out.push_str(&format!("- {}: {}\n", tool.name, tool.description));
                out.push_str(&render_service_call(&service.name, &tool.name, &tool.example_args));
                out.push_str("\n\n");
            }
        }
    }

    if !personas.is_empty() {
        out.push_str("## Available agents\n\n");
        for persona in personas {
            let description = if persona.description.is_empty() {
                "(no description)"
            } else {
                persona.description.as_str()
            };
            out.push_str(&format!("- {}: {}\n", persona.base_name(), description));
        }
        if let Some(first) = personas.first() {
            out.push_str("\nTo ask an agent, emit:\n");
            out.push_str(&render_agent_call(first.base_name(), "your question"));
            out.push('\n');
        }
    }

    out
}

/// 基础提示词 + 能力列表
pub fn system_prompt(base: &str, services: &[ServiceInfo], personas: &[PersonaConfig]) -> String {
    let listing = capability_listing(services, personas);
    if listing.is_empty() {
        base.to_string()
    } else {
        format!("{}\n\n{}", base.trim_end(), listing.trim_end())
    }
}
