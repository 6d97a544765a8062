//! 能力执行器
//!
//! 持有只读的 CapabilityRegistry 与单次调用超时。prepare 做解析与 schema 校验，invoke 在超时内调用，
//! 失败统一映射为步骤级 AgentError；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::{schema, Capability, CapabilityRegistry};

/// 默认单次调用超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 能力执行器：解析 -> 校验 -> 超时内调用
#[derive(Clone)]
pub struct CapabilityExecutor {
    registry: Arc<CapabilityRegistry>,
    timeout: Duration,
}

impl CapabilityExecutor {
    pub fn new(registry: Arc<CapabilityRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// 解析并校验参数，返回可调用的能力
    pub fn prepare(&self, name: &str, args: &Value) -> Result<Arc<dyn Capability>, AgentError> {
        let capability = self.registry.resolve(name)?;
        schema::validate(&capability.input_schema(), args).map_err(|reason| {
            AgentError::InvalidArguments {
                capability: name.to_string(),
                reason,
            }
        })?;
        Ok(capability)
    }

    /// 在超时内调用已校验的能力；超时返回 CapabilityTimeout，能力返回 Err 则转为 CapabilityFailed
    pub async fn invoke(&self, capability: &dyn Capability, args: Value) -> Result<String, AgentError> {
        let name = capability.name().to_string();
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, capability.invoke(args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(message)) => Err(AgentError::CapabilityFailed {
                capability: name,
                message,
            }),
            Err(_) => Err(AgentError::CapabilityTimeout(name)),
        }
    }

}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
