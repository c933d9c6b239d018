//! 对话前端
//!
//! 组装系统提示词（基础提示词 + 可用服务与 Agent 列表），维护仅在内存中的滚动窗口，
//! 以交互模式运行调用循环，回合总超时作为循环的截止时间。超时与提前结束都以文本形式写进回复，不向外抛错。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::agents::PersonaRegistry;
use crate::core::Runtime;
use crate::memory::{ConversationMemory, Message};
use crate::react::prompt;
use crate::react::{LoopMode, RunOptions, TIMED_OUT};
use crate::tools::CapabilityRegistry;

/// 一个用户回合的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub text: String,
    pub rounds_executed: usize,
    /// 正常结束（未超时、未中断）
    pub completed: bool,
}

pub struct Conversation {
    runtime: Arc<Runtime>,
    history: ConversationMemory,
    system_prompt: String,
    turn_timeout: Duration,
}

impl Conversation {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        let app = &runtime.config.app;
        let system_prompt = prompt::system_prompt(
            &app.system_prompt,
            &runtime.services.services(),
            &runtime.personas.list(),
        );
        let history = ConversationMemory::new(app.max_context_messages);
        let turn_timeout = Duration::from_secs(runtime.config.llm.turn_timeout_secs.max(1));
        Self {
            runtime,
            history,
            system_prompt,
            turn_timeout,
        }
    }

    pub fn with_turn_timeout(mut self, turn_timeout: Duration) -> Self {
        self.turn_timeout = turn_timeout;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn history(&self) -> &[Message] {
        self.history.messages()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub async fn send(&mut self, input: &str) -> Turn {
        self.send_with(input, RunOptions::default()).await
    }

    /// 运行一个用户回合；只有正常结束或带部分结果结束时才写入历史
    ///
    /// 回合超时会覆盖 `opts` 中更晚的截止时间。
    pub async fn send_with(&mut self, input: &str, opts: RunOptions<'_>) -> Turn {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(self.history.messages().iter().cloned());
        messages.push(Message::user(input));

        let tool_loop = &self.runtime.tool_loop;
        let max_rounds = tool_loop.max_rounds(LoopMode::Interactive);
        let turn_deadline = Instant::now() + self.turn_timeout;
        let deadline = opts.deadline.map_or(turn_deadline, |d| d.min(turn_deadline));
        let outcome = tool_loop
            .run_with(messages, max_rounds, opts.with_deadline(deadline))
            .await;

        let timed_out = outcome.aborted.as_deref() == Some(TIMED_OUT);
        let text = match (&outcome.aborted, outcome.final_text.is_empty()) {
            (Some(_), true) if timed_out => {
                format!("The request timed out after {:?}.", self.turn_timeout)
            }
            (Some(_), false) if timed_out => format!(
                "{}\n\n(stopped early: timed out after {:?})",
                outcome.final_text, self.turn_timeout
            ),
            (Some(reason), true) => format!("Sorry, the request failed: {}", reason),
            (Some(reason), false) => format!("{}\n\n(stopped early: {})", outcome.final_text, reason),
            (None, _) => outcome.final_text.clone(),
        };

        if !outcome.final_text.is_empty() {
            self.history.push_turn(input, outcome.final_text);
        }

        Turn {
            text,
            rounds_executed: outcome.rounds_executed,
            completed: outcome.aborted.is_none(),
        }
    }
}
