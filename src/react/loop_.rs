//! 调用主循环
//!
//! 调用模型 -> 解析调用块 -> 路由执行 -> 将回复与结果写回消息列表 -> 下一轮；
//! 回复中没有调用块、达到最大轮数、模型调用失败、被取消或超过截止时间时结束。
//! 截止时间作用于每次等待：超时后保留已完成的轮次与消息，原因记为 [`TIMED_OUT`]。
//! 可选 event_tx：向前端推送 RoundStarted / Invocation / InvocationResult / Finished。

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::ToolLoopSection;
use crate::llm::Transport;
use crate::memory::Message;
use crate::react::protocol::{self, InvocationKind};
use crate::react::router::{join_outcomes, InvocationRouter};
use crate::react::LoopEvent;

/// 调用结果预览最大字符数
const RESULT_PREVIEW_CHARS: usize = 200;

/// 超过截止时间时 [`LoopOutcome::aborted`] 的取值
pub const TIMED_OUT: &str = "timed out";

/// 运行模式，决定使用哪个轮数上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Interactive,
    Batch,
}

/// 循环执行结果
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// 最后一次模型回复（达到上限时可能仍含调用块）
    pub final_text: String,
    pub rounds_executed: usize,
    pub messages: Vec<Message>,
    /// 提前结束的原因（模型调用失败、取消或 [`TIMED_OUT`]）
    pub aborted: Option<String>,
}

/// 单次运行的可选项
#[derive(Default, Clone, Copy)]
pub struct RunOptions<'a> {
    pub cancel_token: Option<&'a CancellationToken>,
    pub event_tx: Option<&'a UnboundedSender<LoopEvent>>,
    pub deadline: Option<Instant>,
}

impl<'a> RunOptions<'a> {
    pub fn with_cancel(mut self, token: &'a CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn with_events(mut self, tx: &'a UnboundedSender<LoopEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn send(&self, ev: LoopEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token.map_or(false, |t| t.is_cancelled())
    }

    fn is_past_deadline(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// 在截止时间内等待；超时返回 None
    async fn bounded<F: Future>(&self, fut: F) -> Option<F::Output> {
        match self.deadline {
            Some(deadline) => timeout_at(deadline, fut).await.ok(),
            None => Some(fut.await),
        }
    }
}

pub struct ToolLoop {
    transport: Arc<Transport>,
    router: Arc<InvocationRouter>,
    limits: ToolLoopSection,
}

impl ToolLoop {
    pub fn new(transport: Arc<Transport>, router: Arc<InvocationRouter>, limits: ToolLoopSection) -> Self {
        Self {
            transport,
            router,
            limits,
        }
    }

    pub fn max_rounds(&self, mode: LoopMode) -> usize {
        match mode {
            LoopMode::Interactive => self.limits.max_rounds_interactive,
            LoopMode::Batch => self.limits.max_rounds_batch,
        }
    }

    pub async fn run(&self, messages: Vec<Message>, max_rounds: usize) -> LoopOutcome {
        self.run_with(messages, max_rounds, RunOptions::default()).await
    }

    pub async fn run_mode(&self, messages: Vec<Message>, mode: LoopMode) -> LoopOutcome {
        self.run(messages, self.max_rounds(mode)).await
    }

    /// 执行循环；max_rounds 为 0 时按 1 处理
    pub async fn run_with(
        &self,
        mut messages: Vec<Message>,
        max_rounds: usize,
        opts: RunOptions<'_>,
    ) -> LoopOutcome {
        let max_rounds = max_rounds.max(1);
        let mut rounds = 0;
        let mut final_text = String::new();
        let mut aborted = None;

        while rounds < max_rounds {
            if opts.is_cancelled() {
                tracing::info!("tool loop cancelled after {} rounds", rounds);
                aborted = Some("cancelled".to_string());
                break;
            }
            if opts.is_past_deadline() {
                aborted = Some(self.timed_out(rounds, &opts));
                break;
            }
            opts.send(LoopEvent::RoundStarted {
                round: rounds + 1,
                max_rounds,
            });

            let recreated_before = self.transport.recreations();
            let reply = match opts.bounded(self.transport.complete(&messages)).await {
                None => {
                    aborted = Some(self.timed_out(rounds, &opts));
                    break;
                }
                Some(Ok(reply)) => reply,
                Some(Err(e)) => {
                    tracing::warn!("LLM call failed in round {}: {}", rounds + 1, e);
                    let reason = e.to_string();
                    opts.send(LoopEvent::Aborted {
                        reason: reason.clone(),
                    });
                    aborted = Some(reason);
                    break;
                }
            };
            if self.transport.recreations() != recreated_before {
                opts.send(LoopEvent::ClientRecreated);
            }
            final_text = reply.clone();

            let invocations = protocol::parse(&reply);
            tracing::debug!("round {}: {} invocations", rounds + 1, invocations.len());
            if invocations.is_empty() {
                break;
            }

            for inv in &invocations {
                let kind = match inv.kind() {
                    InvocationKind::Service => "service",
                    InvocationKind::Agent => "agent",
                };
                opts.send(LoopEvent::Invocation {
                    name: inv.name.clone(),
                    kind: kind.to_string(),
                    args: serde_json::to_value(&inv.arguments).unwrap_or_default(),
                });
            }

            let Some(outcomes) = opts.bounded(self.router.execute_each(&invocations)).await else {
                aborted = Some(self.timed_out(rounds, &opts));
                break;
            };
            for outcome in &outcomes {
                opts.send(LoopEvent::InvocationResult {
                    name: outcome.name.clone(),
                    ok: outcome.ok,
                    preview: outcome.text.chars().take(RESULT_PREVIEW_CHARS).collect(),
                });
            }

            messages.push(Message::assistant(reply));
            messages.push(Message::user(join_outcomes(&outcomes)));
            rounds += 1;
        }

        if rounds == max_rounds {
            tracing::info!("tool loop reached max rounds ({})", max_rounds);
        }
        opts.send(LoopEvent::Finished {
            rounds_executed: rounds,
        });

        LoopOutcome {
            final_text,
            rounds_executed: rounds,
            messages,
            aborted,
        }
    }

    fn timed_out(&self, rounds: usize, opts: &RunOptions<'_>) -> String {
        tracing::warn!("tool loop timed out after {} completed rounds", rounds);
        opts.send(LoopEvent::Aborted {
            reason: TIMED_OUT.to_string(),
        });
        TIMED_OUT.to_string()
    }
}
