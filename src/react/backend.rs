//! 模型后端：给定完整对话，返回下一步决策（最终答案或能力调用）
//!
//! decide 对编排状态无副作用；可重试的失败返回 AgentError::Backend，
//! 明确不可重试的失败返回 AgentError::UnrecoverableBackend。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::memory::Message;

/// 单轮决策，只在产生它的那一轮内有效
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelDecision {
    FinalAnswer { text: String },
    ToolCall { capability: String, arguments: Value },
}

impl ModelDecision {
    pub fn final_answer(text: impl Into<String>) -> Self {
        ModelDecision::FinalAnswer { text: text.into() }
    }

    pub fn tool_call(capability: impl Into<String>, arguments: Value) -> Self {
        ModelDecision::ToolCall {
            capability: capability.into(),
            arguments,
        }
    }
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn decide(&self, conversation: &[Message]) -> Result<ModelDecision, AgentError>;
}

/// 脚本化后端：按顺序返回预设结果；脚本耗尽后重复 fallback（未设置时返回 Backend 错误）
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<ModelDecision, AgentError>>>,
    fallback: Option<Result<ModelDecision, AgentError>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    pub fn new(script: impl IntoIterator<Item = Result<ModelDecision, AgentError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// 始终返回同一结果
    pub fn repeating(result: Result<ModelDecision, AgentError>) -> Self {
        Self::new(Vec::new()).then_repeat(result)
    }

    pub fn then_repeat(mut self, result: Result<ModelDecision, AgentError>) -> Self {
        self.fallback = Some(result);
        self
    }

    /// 每次 decide 收到的对话快照
    pub fn conversations(&self) -> Vec<Vec<Message>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.conversations().len()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn decide(&self, conversation: &[Message]) -> Result<ModelDecision, AgentError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(conversation.to_vec());
        }
        let next = self
            .script
            .lock()
            .map_err(|_| AgentError::Backend("script poisoned".to_string()))?
            .pop_front();
        match next {
            Some(result) => result,
            None => self
                .fallback
                .clone()
                .unwrap_or_else(|| Err(AgentError::Backend("script exhausted".to_string()))),
        }
    }
}
