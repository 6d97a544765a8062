//! Agent 错误类型
//!
//! 步骤级错误（未知能力、参数非法、能力执行失败、可重试的后端错误）由 RetryPolicy 吸收并重试；
//! 预算耗尽、超出最大迭代数、不可恢复的后端错误、观察者失败是终止性错误，作为 run 的结果返回。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Duplicate capability: {0}")]
    DuplicateCapability(String),

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Invalid arguments for {capability}: {reason}")]
    InvalidArguments { capability: String, reason: String },

    #[error("Capability {capability} failed: {message}")]
    CapabilityFailed { capability: String, message: String },

    #[error("Capability timeout: {0}")]
    CapabilityTimeout(String),

    /// 可重试的模型后端错误（网络、限流、输出格式错误等）
    #[error("Backend error: {0}")]
    Backend(String),

    /// 后端明确标记为不可重试，立即终止，不消耗重试次数
    #[error("Unrecoverable backend error: {0}")]
    UnrecoverableBackend(String),

    #[error("Retries exhausted after {total_retries} retries: {last_error}")]
    RetriesExhausted {
        step_retries: u32,
        total_retries: u32,
        last_error: String,
    },

    #[error("Max iterations exceeded ({0})")]
    MaxIterationsExceeded(u32),

    /// 观察者处理事件失败：视为调用方缺陷，直接终止
    #[error("Observer failed: {0}")]
    ObserverFailed(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AgentError {
    /// 是否为可被重试策略吸收的步骤级错误
    pub fn is_step_failure(&self) -> bool {
        matches!(
            self,
            AgentError::UnknownCapability(_)
                | AgentError::InvalidArguments { .. }
                | AgentError::CapabilityFailed { .. }
                | AgentError::CapabilityTimeout(_)
                | AgentError::Backend(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failures_are_retriable() {
        assert!(AgentError::UnknownCapability("x".into()).is_step_failure());
        assert!(AgentError::Backend("timeout".into()).is_step_failure());
        assert!(AgentError::CapabilityTimeout("write_mail".into()).is_step_failure());
        assert!(AgentError::InvalidArguments {
            capability: "echo".into(),
            reason: "missing text".into(),
        }
        .is_step_failure());
    }

    #[test]
    fn test_terminal_errors_are_not_retriable() {
        assert!(!AgentError::UnrecoverableBackend("auth".into()).is_step_failure());
        assert!(!AgentError::MaxIterationsExceeded(3).is_step_failure());
        assert!(!AgentError::ObserverFailed("boom".into()).is_step_failure());
        assert!(!AgentError::RetriesExhausted {
            step_retries: 1,
            total_retries: 1,
            last_error: "x".into(),
        }
        .is_step_failure());
    }

    #[test]
    fn test_error_display() {
        let err = AgentError::InvalidArguments {
            capability: "write_mail".into(),
            reason: "missing required property 'to'".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid arguments for write_mail: missing required property 'to'"
        );
    }
}
