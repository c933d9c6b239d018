//! Persona 调用：配置、自定义执行器、占位符与调度

pub mod custom;
pub mod dispatcher;
pub mod persona;
pub mod placeholder;

pub use custom::{CustomExecutor, ExecutionTable};
pub use dispatcher::{default_session_id, validate_messages, AgentDispatcher};
pub use persona::{PersonaConfig, PersonaRegistry, StaticPersonaRegistry};
