//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WEAVE__*` 覆盖（双下划线表示嵌套，如 `WEAVE__LLM__MODEL=deepseek-chat`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::agents::PersonaConfig;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tool_loop: ToolLoopSection,
    pub agents: AgentsSection,
    pub services: ServicesSection,
}

/// [app] 段：应用名、基础系统提示词、对话窗口
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 基础系统提示词，运行时会追加可用服务与 Agent 列表
    pub system_prompt: String,
    /// 主对话保留的历史消息条数（仅内存）
    pub max_context_messages: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            system_prompt: "You are a helpful assistant. When a task needs a tool or another agent, \
                            emit an invocation block exactly as shown below and wait for its result."
                .to_string(),
            max_context_messages: 20,
        }
    }
}

/// [llm] 段：主对话使用的端点、模型与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 仅用于展示；所有后端均按 OpenAI 兼容协议访问
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 未设置时读取 OPENAI_API_KEY；都没有时使用 Mock 客户端
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 单次用户回合（含全部调用轮次）的总超时（秒）
    pub turn_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: "deepseek-chat".to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.7,
            max_tokens: 4096,
            turn_timeout_secs: 180,
        }
    }
}

impl LlmSection {
    /// 配置中的 key 优先，其次环境变量 OPENAI_API_KEY
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()))
    }
}

/// [tool_loop] 段：每个用户回合最多执行的调用轮数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolLoopSection {
    pub max_rounds_interactive: usize,
    pub max_rounds_batch: usize,
}

impl Default for ToolLoopSection {
    fn default() -> Self {
        Self {
            max_rounds_interactive: 5,
            max_rounds_batch: 10,
        }
    }
}

/// [agents] 段：persona 会话参数与 persona 来源
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentsSection {
    /// 每个会话保留的 (user, assistant) 轮数
    pub max_history_rounds: usize,
    pub context_ttl_hours: u64,
    /// 过期会话清理间隔（秒）
    pub cleanup_interval_secs: u64,
    /// 额外的 persona 目录（每个 *.toml 一个 [persona] 段）
    pub persona_dir: Option<PathBuf>,
    pub personas: Vec<PersonaConfig>,
}

impl Default for AgentsSection {
    fn default() -> Self {
        Self {
            max_history_rounds: 7,
            context_ttl_hours: 24,
            cleanup_interval_secs: 3600,
            persona_dir: None,
            personas: Vec::new(),
        }
    }
}

/// [services] 段：内置服务开关与调用超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServicesSection {
    pub timeout_secs: u64,
    /// 启用的内置服务名（echo、clock）
    pub enabled: Vec<String>,
}

impl Default for ServicesSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            enabled: vec!["echo".into(), "clock".into()],
        }
    }
}

/// 从 config 目录加载配置，环境变量 WEAVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WEAVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WEAVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
