//! 系统提示词占位符替换
//!
//! 依次处理 persona 字段、环境变量、当前时间三类占位符。未知的 {{X}} 若不像环境变量名则原样保留。

use std::sync::OnceLock;

use chrono::{Local, NaiveDateTime};
use regex::Regex;

use super::persona::PersonaConfig;

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{([A-Z_][A-Z0-9_]*)\}\}").expect("env pattern is valid"))
}

/// 用进程环境变量与本地时钟替换占位符
pub fn render(template: &str, persona: &PersonaConfig) -> String {
    render_with(template, persona, Local::now().naive_local(), |key| {
        std::env::var(key).ok()
    })
}

/// 可注入环境查询与时钟的版本
pub fn render_with<F>(template: &str, persona: &PersonaConfig, now: NaiveDateTime, env: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let fixed = [
        ("{{AgentName}}", persona.name.clone()),
        ("{{MaidName}}", persona.name.clone()),
        ("{{BaseName}}", persona.base_name().to_string()),
        ("{{Description}}", persona.description.clone()),
        ("{{ModelId}}", persona.model_id.clone()),
        ("{{Temperature}}", persona.temperature.to_string()),
        ("{{MaxTokens}}", persona.max_output_tokens.to_string()),
        ("{{ModelProvider}}", persona.model_provider.clone()),
    ];
    let mut text = template.to_string();
    for (token, value) in &fixed {
        text = text.replace(token, value);
    }

    text = text
        .replace("{{CurrentDateTime}}", &now.format("%Y-%m-%d %H:%M:%S").to_string())
        .replace("{{CurrentDate}}", &now.format("%Y-%m-%d").to_string())
        .replace("{{CurrentTime}}", &now.format("%H:%M:%S").to_string());

    env_pattern()
        .replace_all(&text, |caps: &regex::Captures| env(&caps[1]).unwrap_or_default())
        .into_owned()
}
