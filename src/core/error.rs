//! Agent 调用错误
//!
//! 这些错误都只作用于单次调用：路由器会把它们转成该调用的结果文本，不会中断所在轮次。

use thiserror::Error;

use crate::llm::LlmError;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{}", unknown_persona_message(.name, .available))]
    UnknownPersona { name: String, available: Vec<String> },

    #[error("custom executor '{executor}' for agent '{persona}' is not registered")]
    UnknownExecutor { persona: String, executor: String },

    #[error("invalid message sequence: {0}")]
    InvalidMessages(String),

    #[error("agent config error: {0}")]
    Config(String),

    #[error("custom executor failed: {0}")]
    Execution(String),

    #[error("LLM call failed: {0}")]
    Transport(#[from] LlmError),
}

fn unknown_persona_message(name: &str, available: &[String]) -> String {
    let mut msg = format!("requested agent '{}' was not found or is not configured.", name);
    if available.is_empty() {
        msg.push_str(" No agents are loaded; check the configuration.");
    } else {
        msg.push_str(&format!(" Loaded agents: {}.", available.join(", ")));
    }
    msg.push_str(" Please check the agent name.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_persona_lists_available() {
        let err = DispatchError::UnknownPersona {
            name: "ghost".into(),
            available: vec!["helper".into(), "critic".into()],
        };
        let text = err.to_string();
        assert!(text.contains("'ghost'"));
        assert!(text.contains("helper, critic"));
    }

    #[test]
    fn test_unknown_persona_without_agents() {
        let err = DispatchError::UnknownPersona {
            name: "ghost".into(),
            available: vec![],
        };
        assert!(err.to_string().contains("No agents are loaded"));
    }

    #[test]
    fn test_transport_error_wraps_llm_error() {
        let err: DispatchError = LlmError::Api("rate limited".into()).into();
        assert_eq!(err.to_string(), "LLM call failed: API error: rate limited");
    }
}
