//! Agent 调度器
//!
//! 解析 persona → 自定义执行器（若配置）或 LLM：
//! system（占位符替换后）+ 会话历史 + 本轮 query，校验后按 persona 的模型参数调用。
//! 成功后才写回会话；任何失败都不改动历史。

use std::sync::Arc;

use crate::core::DispatchError;
use crate::llm::LlmFactory;
use crate::memory::{AgentSessionStore, Message, Role};

use super::custom::ExecutionTable;
use super::persona::{PersonaConfig, PersonaRegistry};
use super::placeholder;

/// 未指定会话时使用的默认会话 ID
pub fn default_session_id(persona: &PersonaConfig) -> String {
    format!("agent_{}_default_user_session", persona.base_name())
}

/// 校验发送给模型的消息序列：非空且首条为 system
///
/// system 内容允许为空（例如占位符展开为空的提示词），角色由 [`Role`] 枚举保证合法。
pub fn validate_messages(messages: &[Message]) -> Result<(), DispatchError> {
    let first = messages
        .first()
        .ok_or_else(|| DispatchError::InvalidMessages("message list is empty".to_string()))?;
    if first.role != Role::System {
        return Err(DispatchError::InvalidMessages(format!(
            "first message must be system, got {}",
            first.role.as_str()
        )));
    }
    Ok(())
}

pub struct AgentDispatcher {
    personas: Arc<dyn PersonaRegistry>,
    executors: Arc<ExecutionTable>,
    sessions: Arc<AgentSessionStore>,
    factory: Arc<dyn LlmFactory>,
}

impl AgentDispatcher {
    pub fn new(
        personas: Arc<dyn PersonaRegistry>,
        executors: Arc<ExecutionTable>,
        sessions: Arc<AgentSessionStore>,
        factory: Arc<dyn LlmFactory>,
    ) -> Self {
        Self {
            personas,
            executors,
            sessions,
            factory,
        }
    }

    /// 调用一个 persona；session_id 为 None 时使用该 persona 的默认会话
    pub async fn call(
        &self,
        persona_name: &str,
        query: &str,
        session_id: Option<&str>,
    ) -> Result<String, DispatchError> {
        let persona = self.personas.resolve(persona_name).ok_or_else(|| {
            DispatchError::UnknownPersona {
                name: persona_name.to_string(),
                available: self
                    .personas
                    .list()
                    .iter()
                    .map(|p| p.base_name().to_string())
                    .collect(),
            }
        })?;

        if let Some(executor_id) = &persona.execution {
            let executor = self.executors.get(executor_id).ok_or_else(|| {
                DispatchError::UnknownExecutor {
                    persona: persona.name.clone(),
                    executor: executor_id.clone(),
                }
            })?;
            tracing::info!(persona = %persona.name, executor = %executor_id, "running custom executor");
            return executor.execute(query).await.map_err(DispatchError::Execution);
        }

        let session_id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| default_session_id(&persona));
        let history = self.sessions.history(&persona.name, &session_id).await;

        let user_text = placeholder::render(query, &persona);
        let messages = build_messages(&persona, &history, &user_text);
        validate_messages(&messages)?;
        for (i, m) in messages.iter().enumerate() {
            tracing::debug!(
                "[{}] message {}: role={} content={}",
                persona.name,
                i,
                m.role.as_str(),
                m.content.chars().take(80).collect::<String>()
            );
        }

        if persona.model_id.trim().is_empty() {
            return Err(DispatchError::Config(format!(
                "agent '{}' has no model id configured",
                persona.name
            )));
        }
        if persona.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(DispatchError::Config(format!(
                "agent '{}' has no API key configured",
                persona.name
            )));
        }

        let client = self.factory.create(&persona.endpoint());
        let reply = client
            .complete(&messages, &persona.completion_request())
            .await?;

        self.sessions
            .record(&persona.name, &session_id, &history, &user_text, &reply)
            .await;
        tracing::info!(
            persona = %persona.name,
            session = %session_id,
            reply_len = reply.len(),
            "agent call succeeded"
        );
        Ok(reply)
    }
}

fn build_messages(persona: &PersonaConfig, history: &[Message], user_text: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(placeholder::render(
        &persona.system_prompt,
        persona,
    )));
    messages.extend(history.iter().cloned());
    messages.push(Message::user(user_text));
    messages
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::agents::custom::CustomExecutor;
    use crate::agents::persona::StaticPersonaRegistry;
    use crate::llm::{CompletionRequest, Endpoint, LlmError, ScriptedFactory, ScriptedLlmClient};

    fn helper() -> PersonaConfig {
        PersonaConfig::new("helper")
            .with_model("test-model")
            .with_api_key("sk-test")
            .with_system_prompt("You are {{AgentName}}.")
    }

    fn dispatcher_with(
        personas: Vec<PersonaConfig>,
        table: ExecutionTable,
        client: Arc<ScriptedLlmClient>,
    ) -> (AgentDispatcher, Arc<AgentSessionStore>) {
        let (dispatcher, store, _) = dispatcher_and_factory(personas, table, client);
        (dispatcher, store)
    }

    fn dispatcher_and_factory(
        personas: Vec<PersonaConfig>,
        table: ExecutionTable,
        client: Arc<ScriptedLlmClient>,
    ) -> (AgentDispatcher, Arc<AgentSessionStore>, Arc<ScriptedFactory>) {
        let store = Arc::new(AgentSessionStore::new(2, Duration::from_secs(60)));
        let factory = Arc::new(ScriptedFactory::new(vec![client]));
        let dispatcher = AgentDispatcher::new(
            Arc::new(StaticPersonaRegistry::new(personas)),
            Arc::new(table),
            store.clone(),
            factory.clone(),
        );
        (dispatcher, store, factory)
    }

    #[test]
    fn test_validate_messages() {
        assert!(validate_messages(&[]).is_err());
        assert!(validate_messages(&[Message::user("hi")]).is_err());
        assert!(validate_messages(&[Message::system("s"), Message::user("u")]).is_ok());
        assert!(validate_messages(&[Message::system(""), Message::user("u")]).is_ok());
        assert!(validate_messages(&[
            Message::system("s"),
            Message::user("u"),
            Message::system("later")
        ])
        .is_ok());
    }

    #[tokio::test]
    async fn test_empty_system_prompt_still_calls_llm() {
        let persona = helper().with_system_prompt("{{WEAVE_UNSET_PROMPT_VAR}}");
        let client = Arc::new(ScriptedLlmClient::new(vec![Ok("fine".into())]));
        let (dispatcher, _) = dispatcher_with(vec![persona], ExecutionTable::new(), client.clone());

        assert_eq!(dispatcher.call("helper", "q", None).await.unwrap(), "fine");
        let sent = client.messages_at(0).unwrap();
        assert_eq!(sent[0], Message::system(""));
        assert_eq!(sent[1], Message::user("q"));
    }

    #[tokio::test]
    async fn test_persona_endpoint_and_generation_params_reach_llm() {
        let mut persona = helper();
        persona.api_base_url = Some("https://agents.example.test/v1".into());
        persona.temperature = 0.2;
        persona.max_output_tokens = 512;
        let client = Arc::new(ScriptedLlmClient::new(vec![Ok("ok".into())]));
        let (dispatcher, _, factory) =
            dispatcher_and_factory(vec![persona], ExecutionTable::new(), client.clone());

        dispatcher.call("helper", "q", None).await.unwrap();

        assert_eq!(
            factory.endpoints(),
            vec![Endpoint::new(Some("https://agents.example.test/v1"), Some("sk-test"))]
        );
        assert_eq!(
            client.request_at(0).unwrap(),
            CompletionRequest::new("test-model", 0.2, 512)
        );
    }

    #[test]
    fn test_default_session_id_uses_base_name() {
        let mut p = PersonaConfig::new("helper-v2");
        p.base_name = "helper".into();
        assert_eq!(default_session_id(&p), "agent_helper_default_user_session");
    }

    #[tokio::test]
    async fn test_call_builds_messages_and_records_history() {
        let client = Arc::new(ScriptedLlmClient::new(vec![
            Ok("first answer".into()),
            Ok("second answer".into()),
        ]));
        let (dispatcher, store) =
            dispatcher_with(vec![helper()], ExecutionTable::new(), client.clone());

        assert_eq!(dispatcher.call("helper", "q1", None).await.unwrap(), "first answer");
        assert_eq!(dispatcher.call("helper", "q2", None).await.unwrap(), "second answer");

        let second = client.messages_at(1).unwrap();
        assert_eq!(second[0], Message::system("You are helper."));
        assert_eq!(second[1], Message::user("q1"));
        assert_eq!(second[2], Message::assistant("first answer"));
        assert_eq!(second[3], Message::user("q2"));
        assert_eq!(client.request_at(0).unwrap().model, "test-model");

        let history = store
            .history("helper", "agent_helper_default_user_session")
            .await;
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_persona_creates_no_session() {
        let client = Arc::new(ScriptedLlmClient::repeating("never"));
        let (dispatcher, store) =
            dispatcher_with(vec![helper()], ExecutionTable::new(), client.clone());

        let err = dispatcher.call("ghost", "hi", None).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownPersona { .. }));
        assert!(err.to_string().contains("helper"));
        assert_eq!(store.session_count().await, 0);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_history_unchanged() {
        let client = Arc::new(ScriptedLlmClient::new(vec![Err(LlmError::Api("boom".into()))]));
        let (dispatcher, store) =
            dispatcher_with(vec![helper()], ExecutionTable::new(), client);

        let err = dispatcher.call("helper", "q", Some("s1")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Transport(_)));
        assert!(store.history("helper", "s1").await.is_empty());
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let mut persona = helper();
        persona.api_key = None;
        let client = Arc::new(ScriptedLlmClient::repeating("never"));
        let (dispatcher, store) =
            dispatcher_with(vec![persona], ExecutionTable::new(), client.clone());

        let err = dispatcher.call("helper", "q", None).await.unwrap_err();
        assert!(matches!(err, DispatchError::Config(_)));
        assert_eq!(client.calls(), 0);
        assert_eq!(store.session_count().await, 0);
    }

    struct Reverse;

    #[async_trait]
    impl CustomExecutor for Reverse {
        async fn execute(&self, query: &str) -> Result<String, String> {
            Ok(query.chars().rev().collect())
        }
    }

    #[tokio::test]
    async fn test_custom_executor_bypasses_llm() {
        let mut table = ExecutionTable::new();
        table.register("reverse", Reverse);
        let client = Arc::new(ScriptedLlmClient::repeating("never"));
        let (dispatcher, store) = dispatcher_with(
            vec![PersonaConfig::new("mirror").with_execution("reverse")],
            table,
            client.clone(),
        );

        assert_eq!(dispatcher.call("mirror", "abc", None).await.unwrap(), "cba");
        assert_eq!(client.calls(), 0);
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_executor_is_explicit_error() {
        let client = Arc::new(ScriptedLlmClient::repeating("never"));
        let (dispatcher, _) = dispatcher_with(
            vec![PersonaConfig::new("mirror").with_execution("reverse")],
            ExecutionTable::new(),
            client,
        );
        let err = dispatcher.call("mirror", "abc", None).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownExecutor { .. }));
    }
}
