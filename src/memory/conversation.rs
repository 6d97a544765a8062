//! 对话记忆：按序追加的消息日志
//!
//! 编排循环每轮把完整快照交给模型后端重建上下文。引擎默认使用 UnconstrainedMemory（不设上限）；
//! 需要限长时由调用方换成 SlidingWindowMemory。

use serde::{Deserialize, Serialize};

/// 消息角色
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

/// 单条消息；role 为 Tool 时 tool_name 记录产生该输出的能力名
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_name: None,
        }
    }

    pub fn tool(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_name: Some(tool_name.into()),
        }
    }

    /// 工具输出在对话型 LLM 接口中的文本形式（作为 user 消息发送）
    pub fn observation_text(&self) -> String {
        format!(
            "Observation from {}: {}",
            self.tool_name.as_deref().unwrap_or("tool"),
            self.content
        )
    }
}

/// 对话记忆：append 永不失败，snapshot 返回只读视图
pub trait Memory: Send {
    fn append(&mut self, message: Message);

    fn snapshot(&self) -> &[Message];

    fn len(&self) -> usize {
        self.snapshot().len()
    }

    fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

/// 无上限记忆
#[derive(Clone, Debug, Default)]
pub struct UnconstrainedMemory {
    messages: Vec<Message>,
}

impl UnconstrainedMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Memory for UnconstrainedMemory {
    fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    fn snapshot(&self) -> &[Message] {
        &self.messages
    }
}

/// 定长窗口记忆：超过 max_messages 时丢弃最旧的消息，但始终保留第一条（任务 prompt）
#[derive(Clone, Debug)]
pub struct SlidingWindowMemory {
    messages: Vec<Message>,
    max_messages: usize,
}

impl SlidingWindowMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages: max_messages.max(1),
        }
    }

    fn prune(&mut self) {
        if self.messages.len() > self.max_messages {
            let excess = self.messages.len() - self.max_messages;
            self.messages.drain(1..1 + excess);
        }
    }
}

impl Memory for SlidingWindowMemory {
    fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.prune();
    }

    fn snapshot(&self) -> &[Message] {
        &self.messages
    }
}
