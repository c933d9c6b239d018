//! Clock 服务：本地日期与时间

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Local;

use crate::tools::{Service, ToolSpec};

pub struct ClockService;

#[async_trait]
impl Service for ClockService {
    fn name(&self) -> &str {
        "clock"
    }

    fn description(&self) -> &str {
        "Local date and time"
    }

    fn tools(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::new("now", "Current local date and time (YYYY-MM-DD HH:MM:SS)"),
            ToolSpec::new("date", "Current local date (YYYY-MM-DD)"),
        ]
    }

    async fn call(&self, tool_name: &str, _args: &BTreeMap<String, String>) -> Result<String, String> {
        let now = Local::now();
        match tool_name {
            "now" => Ok(now.format("%Y-%m-%d %H:%M:%S").to_string()),
            "date" => Ok(now.format("%Y-%m-%d").to_string()),
            other => Err(format!("unknown tool: {other}")),
        }
    }
}
