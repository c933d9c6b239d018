//! Echo 服务（测试用）

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::tools::{Service, ToolSpec};

/// Echo 服务：回显 text 参数
pub struct EchoService;

#[async_trait]
impl Service for EchoService {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text back (for testing)"
    }

    fn tools(&self) -> Vec<ToolSpec> {
        vec![ToolSpec::new("echo", "Return the given text unchanged").with_example("text", "hello")]
    }

    async fn call(&self, tool_name: &str, args: &BTreeMap<String, String>) -> Result<String, String> {
        if tool_name != "echo" {
            return Err(format!("unknown tool: {tool_name}"));
        }
        Ok(args
            .get("text")
            .cloned()
            .unwrap_or_else(|| "(empty)".to_string()))
    }
}
