//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! MockLlmClient：首轮回显为 echo 工具调用，见到工具输出后直接给出最终回复。
//! ScriptedLlmClient：按脚本依次返回预设回复或错误，并记录每次收到的消息。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        // 工具输出以 "Observation from" 形式回到 user 消息中
        if let Some(obs) = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User && m.content.starts_with("Observation from"))
        {
            return Ok(format!("Done. {}", obs.content));
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        let call = serde_json::json!({
            "tool": "echo",
            "args": { "text": format!("Echo from Mock: {}", last_user) }
        });
        Ok(call.to_string())
    }
}

/// 脚本化客户端：每次 complete 弹出一条回复；脚本耗尽后返回 Other 错误
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new(replies: impl IntoIterator<Item = Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 每次调用收到的完整消息列表（含 system）
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        self.replies
            .lock()
            .map_err(|_| LlmError::Other("script poisoned".to_string()))?
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Other("script exhausted".to_string())))
    }
}
