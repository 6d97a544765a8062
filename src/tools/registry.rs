//! 能力注册表
//!
//! 所有能力实现 Capability trait（name / description / input_schema / invoke），由 CapabilityRegistry
//! 按名注册与解析。注册只发生在 Agent 构建时，run 期间只读，可通过 Arc 在多个 Agent 间共享。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::AgentError;

/// 能力 trait：名称、描述（供 LLM 理解）、输入 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Capability: Send + Sync {
    /// 能力名称（对应 tool call JSON 中的 "tool" 字段），在注册表内唯一
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 输入参数的 JSON Schema，调用前用于校验
    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行能力；Err 为能力内部失败
    async fn invoke(&self, args: Value) -> Result<String, String>;
}

/// 能力注册表：名称精确匹配；按名称排序存储，保证描述与 schema 输出稳定
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册能力；同名已存在时返回 DuplicateCapability
    pub fn register(&mut self, capability: impl Capability + 'static) -> Result<(), AgentError> {
        self.register_arc(Arc::new(capability))
    }

    pub fn register_arc(&mut self, capability: Arc<dyn Capability>) -> Result<(), AgentError> {
        let name = capability.name().to_string();
        if self.capabilities.contains_key(&name) {
            return Err(AgentError::DuplicateCapability(name));
        }
        tracing::debug!(capability = %name, "capability registered");
        self.capabilities.insert(name, capability);
        Ok(())
    }

    /// 按名解析；不存在时返回 UnknownCapability，从不静默忽略
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Capability>, AgentError> {
        self.capabilities
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::UnknownCapability(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.capabilities.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// 生成能力列表 JSON（name / description / parameters），拼入 system prompt
    pub fn to_schema_json(&self) -> String {
        let capabilities: Vec<Value> = self
            .capabilities
            .values()
            .map(|c| {
                serde_json::json!({
                    "name": c.name(),
                    "description": c.description(),
                    "parameters": c.input_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&capabilities).unwrap_or_else(|_| "[]".to_string())
    }
}
