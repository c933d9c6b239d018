//! 文本内嵌调用协议
//!
//! 模型在回复中以如下块请求调用，块可出现在任意位置、任意数量，与普通文字交错：
//!
//! ```text
//! <<<[TOOL_REQUEST]>>>
//!   agentType: 「始」mcp「末」
//!   service_name: 「始」clock「末」
//!   tool_name: 「始」now「末」
//! <<<[END_TOOL_REQUEST]>>>
//! ```
//!
//! parse 从左到右扫描，格式不完整的块直接丢弃，不影响后续块；render_* 生成 parse 可接受的标准块。

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

pub const OPEN_MARKER: &str = "<<<[TOOL_REQUEST]>>>";
pub const CLOSE_MARKER: &str = "<<<[END_TOOL_REQUEST]>>>";
pub const VALUE_BEGIN: &str = "「始」";
pub const VALUE_END: &str = "「末」";

/// 路由专用参数，调用服务前会被去掉
pub const KEY_AGENT_TYPE: &str = "agentType";
pub const KEY_SERVICE_NAME: &str = "service_name";
pub const KEY_TOOL_NAME: &str = "tool_name";
pub const KEY_AGENT_NAME: &str = "agent_name";
pub const KEY_QUERY: &str = "query";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    Service,
    Agent,
}

/// 调用目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Service { service: String, tool: String },
    Agent { persona: String, query: String },
}

/// 解析出的单次调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// 结果回报时使用的名称
    pub name: String,
    pub target: Target,
    /// 参数原始值（已 trim），同名参数以最后一次出现为准
    pub arguments: BTreeMap<String, String>,
}

impl Invocation {
    pub fn kind(&self) -> InvocationKind {
        match self.target {
            Target::Service { .. } => InvocationKind::Service,
            Target::Agent { .. } => InvocationKind::Agent,
        }
    }
}

fn argument_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\w+)\s*:\s*「始」([\s\S]*?)「末」").expect("argument pattern is valid")
    })
}

/// 提取块内全部 `key: 「始」value「末」` 参数
pub fn parse_arguments(body: &str) -> BTreeMap<String, String> {
    argument_pattern()
        .captures_iter(body)
        .map(|cap| (cap[1].to_string(), cap[2].trim().to_string()))
        .collect()
}

/// 解析文本中的全部调用，保持出现顺序；没有调用时返回空
pub fn parse(text: &str) -> Vec<Invocation> {
    let mut invocations = Vec::new();
    let mut cursor = 0;

    while let Some(rel) = text[cursor..].find(OPEN_MARKER) {
        let body_start = cursor + rel + OPEN_MARKER.len();
        let rest = &text[body_start..];
        let close = rest.find(CLOSE_MARKER);
        let next_open = rest.find(OPEN_MARKER);

        match close {
            Some(end) if next_open.map_or(true, |n| end < n) => {
                let body = rest[..end].trim();
                match build_invocation(parse_arguments(body)) {
                    Some(inv) => invocations.push(inv),
                    None => tracing::debug!("dropping malformed invocation block: {}", preview(body)),
                }
                cursor = body_start + end + CLOSE_MARKER.len();
            }
            _ => {
                tracing::debug!("dropping unclosed invocation marker at byte {}", body_start - OPEN_MARKER.len());
                cursor = body_start;
            }
        }
    }

    invocations
}

fn build_invocation(mut args: BTreeMap<String, String>) -> Option<Invocation> {
    let kind = args
        .get(KEY_AGENT_TYPE)
        .map(|v| v.to_lowercase())
        .unwrap_or_else(|| "mcp".to_string());

    if kind == "agent" {
        let persona = non_empty(&args, KEY_AGENT_NAME)?;
        let query = non_empty(&args, KEY_QUERY)?;
        return Some(Invocation {
            name: persona.clone(),
            target: Target::Agent { persona, query },
            arguments: args,
        });
    }

    if kind != "mcp" && kind != "service" {
        tracing::debug!("unrecognized agentType '{}', treating as service call", kind);
    }

    let tool = non_empty(&args, KEY_TOOL_NAME)?;
    let service = match args.get(KEY_SERVICE_NAME) {
        Some(service) => service.clone(),
        None => {
            // 旧格式：tool_name 同时作为服务名
            args.insert(KEY_SERVICE_NAME.to_string(), tool.clone());
            args.insert(KEY_AGENT_TYPE.to_string(), "mcp".to_string());
            tool.clone()
        }
    };

    Some(Invocation {
        name: tool.clone(),
        target: Target::Service { service, tool },
        arguments: args,
    })
}

fn non_empty(args: &BTreeMap<String, String>, key: &str) -> Option<String> {
    args.get(key).filter(|v| !v.is_empty()).cloned()
}

fn preview(body: &str) -> String {
    body.chars().take(120).collect()
}

fn push_arg(block: &mut String, key: &str, value: &str) {
    block.push_str(&format!("{key}: {VALUE_BEGIN}{value}{VALUE_END}\n"));
}

/// 生成服务调用块
pub fn render_service_call(service: &str, tool: &str, args: &[(String, String)]) -> String {
    let mut block = format!("{OPEN_MARKER}\n");
    push_arg(&mut block, KEY_AGENT_TYPE, "mcp");
    push_arg(&mut block, KEY_SERVICE_NAME, service);
    push_arg(&mut block, KEY_TOOL_NAME, tool);
    for (key, value) in args {
        push_arg(&mut block, key, value);
    }
    block.push_str(CLOSE_MARKER);
    block
}

/// 生成 Agent 调用块
pub fn render_agent_call(persona: &str, query: &str) -> String {
    let mut block = format!("{OPEN_MARKER}\n");
    push_arg(&mut block, KEY_AGENT_TYPE, "agent");
    push_arg(&mut block, KEY_AGENT_NAME, persona);
    push_arg(&mut block, KEY_QUERY, query);
    block.push_str(CLOSE_MARKER);
    block
}
