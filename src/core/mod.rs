//! 核心层：错误类型与重试预算

pub mod error;
pub mod retry;

pub use error::AgentError;
pub use retry::{ExecutionConfig, IterationState, RetryPolicy};
