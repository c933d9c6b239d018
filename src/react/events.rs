//! 调用循环过程事件：供前端或日志订阅轮次、调用与结果

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// 第几轮开始调用模型（从 1 开始）
    RoundStarted { round: usize, max_rounds: usize },
    /// 主对话客户端因连接关闭被重建并重试
    ClientRecreated,
    /// 即将执行的调用
    Invocation {
        name: String,
        kind: String,
        args: serde_json::Value,
    },
    /// 调用结果（预览，避免过长）
    InvocationResult {
        name: String,
        ok: bool,
        preview: String,
    },
    /// 模型调用失败或超过截止时间，循环提前结束
    Aborted { reason: String },
    /// 循环结束
    Finished { rounds_executed: usize },
}
