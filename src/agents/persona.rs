//! Persona 配置与注册表
//!
//! Persona 来自配置文件 [[agents.personas]] 以及可选目录（每个 *.toml 一个 [persona] 段）。
//! 按 name 查找，找不到时再按 base_name 查找。

use std::path::Path;

use serde::Deserialize;

use crate::llm::{CompletionRequest, Endpoint};

/// 单个 persona 的静态配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersonaConfig {
    pub name: String,
    /// 对外展示的基础名，未设置时等同 name
    #[serde(default)]
    pub base_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default = "default_model_provider")]
    pub model_provider: String,
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// 系统提示词模板，支持 {{AgentName}} 等占位符
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// 自定义执行器 ID（在 ExecutionTable 中注册）；设置后不走 LLM
    pub execution: Option<String>,
}

fn default_model_provider() -> String {
    "openai".to_string()
}

fn default_system_prompt() -> String {
    "You are {{AgentName}}. {{Description}}".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    8192
}

impl PersonaConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_name: String::new(),
            description: String::new(),
            model_id: String::new(),
            model_provider: default_model_provider(),
            api_base_url: None,
            api_key: None,
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            system_prompt: default_system_prompt(),
            execution: None,
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_execution(mut self, executor_id: impl Into<String>) -> Self {
        self.execution = Some(executor_id.into());
        self
    }

    pub fn base_name(&self) -> &str {
        if self.base_name.is_empty() {
            &self.name
        } else {
            &self.base_name
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.api_base_url.as_deref(), self.api_key.as_deref())
    }

    pub fn completion_request(&self) -> CompletionRequest {
        CompletionRequest::new(&self.model_id, self.temperature, self.max_output_tokens)
    }
}

/// Persona 注册表接口
pub trait PersonaRegistry: Send + Sync {
    fn resolve(&self, name: &str) -> Option<PersonaConfig>;

    fn list(&self) -> Vec<PersonaConfig>;
}

#[derive(Debug, Deserialize)]
struct PersonaToml {
    persona: PersonaConfig,
}

/// 启动时构建的静态注册表，保持注册顺序
#[derive(Debug, Default, Clone)]
pub struct StaticPersonaRegistry {
    personas: Vec<PersonaConfig>,
}

impl StaticPersonaRegistry {
    pub fn new(personas: Vec<PersonaConfig>) -> Self {
        let mut registry = Self::default();
        for persona in personas {
            registry.insert(persona);
        }
        registry
    }

    /// 同名 persona 以后加入的为准
    pub fn insert(&mut self, persona: PersonaConfig) {
        if let Some(existing) = self.personas.iter_mut().find(|p| p.name == persona.name) {
            tracing::warn!("Persona '{}' defined twice, keeping the latest", persona.name);
            *existing = persona;
        } else {
            self.personas.push(persona);
        }
    }

    /// 为未配置端点 / 模型的 persona 填入全局默认值
    pub fn fill_defaults(&mut self, endpoint: &Endpoint, model: &str) {
        for persona in &mut self.personas {
            if persona.api_key.is_none() {
                persona.api_key = endpoint.api_key.clone();
            }
            if persona.api_base_url.is_none() {
                persona.api_base_url = endpoint.base_url.clone();
            }
            if persona.model_id.is_empty() {
                persona.model_id = model.to_string();
            }
        }
    }

    /// 加载目录下所有 *.toml；无法解析的文件记录警告后跳过，返回加载数量
    pub fn load_dir(&mut self, dir: &Path) -> std::io::Result<usize> {
        if !dir.exists() {
            return Ok(0);
        }
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let parsed = std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|content| {
                    toml::from_str::<PersonaToml>(&content).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(file) => {
                    self.insert(file.persona);
                    loaded += 1;
                }
                Err(e) => tracing::warn!("Skipping persona file {:?}: {}", path, e),
            }
        }
        tracing::info!("Loaded {} personas from {:?}", loaded, dir);
        Ok(loaded)
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl PersonaRegistry for StaticPersonaRegistry {
    fn resolve(&self, name: &str) -> Option<PersonaConfig> {
        self.personas
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.personas.iter().find(|p| p.base_name() == name))
            .cloned()
    }

    fn list(&self) -> Vec<PersonaConfig> {
        self.personas.clone()
    }
}
