//! 调用层：文本协议解析、路由、主循环与能力提示

pub mod events;
pub mod loop_;
pub mod prompt;
pub mod protocol;
pub mod router;

pub use events::LoopEvent;
pub use loop_::{LoopMode, LoopOutcome, RunOptions, ToolLoop, TIMED_OUT};
pub use protocol::{parse, Invocation, InvocationKind, Target};
pub use router::{InvocationOutcome, InvocationRouter};
