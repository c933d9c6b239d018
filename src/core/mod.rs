//! 核心层：错误类型、运行时构建与后台监管

pub mod builder;
pub mod error;
pub mod supervisor;

pub use builder::{Bootstrap, Runtime, RuntimeBuilder};
pub use error::DispatchError;
pub use supervisor::Supervisor;
