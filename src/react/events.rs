//! 生命周期事件与观察者
//!
//! 编排循环按状态机转换的因果顺序发出 AgentEvent；EventChannel 同步地、按注册顺序把每个事件交给
//! 所有观察者，全部处理完才继续下一步。观察者返回 Err 视为调用方缺陷，run 立即以
//! ObserverFailed 终止，后续观察者与后续事件都不再投递。

use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::AgentError;

/// 单次 run 的过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// run 开始
    Start,
    /// 模型决策（key 为 "tool_call" 或 "final_answer"）
    Update { key: String, value: String },
    /// 即将重试当前步骤；计数为本次重试之后的值
    Retry { step_retries: u32, total_retries: u32 },
    /// 步骤失败或 run 终止的错误
    Error { error: String },
    ToolSuccess { tool: String, value: String },
    ToolError { tool: String, error: String },
    /// 得到最终答案，总是 run 的最后一个事件
    Success { text: String },
}

impl AgentEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::Start => "start",
            AgentEvent::Update { .. } => "update",
            AgentEvent::Retry { .. } => "retry",
            AgentEvent::Error { .. } => "error",
            AgentEvent::ToolSuccess { .. } => "tool_success",
            AgentEvent::ToolError { .. } => "tool_error",
            AgentEvent::Success { .. } => "success",
        }
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ObserverError(pub String);

/// 观察者：对每个事件同步调用
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &AgentEvent) -> Result<(), ObserverError>;
}

impl<F> Observer for F
where
    F: Fn(&AgentEvent) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_event(&self, event: &AgentEvent) -> Result<(), ObserverError> {
        self(event)
    }
}

/// 有序事件通道：单个在途事件，无缓冲
pub struct EventChannel<'a> {
    observers: Vec<&'a dyn Observer>,
}

impl<'a> EventChannel<'a> {
    pub fn new(observers: &[&'a dyn Observer]) -> Self {
        Self {
            observers: observers.to_vec(),
        }
    }

    pub fn emit(&self, event: AgentEvent) -> Result<(), AgentError> {
        tracing::trace!(kind = event.kind(), "emit");
        for observer in &self.observers {
            observer
                .on_event(&event)
                .map_err(|e| AgentError::ObserverFailed(e.to_string()))?;
        }
        Ok(())
    }
}

/// 记录所有事件（测试与回放用）
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<AgentEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(AgentEvent::kind).collect()
    }
}

impl Observer for EventRecorder {
    fn on_event(&self, event: &AgentEvent) -> Result<(), ObserverError> {
        self.events
            .lock()
            .map_err(|_| ObserverError("event recorder poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}

/// 转发到 mpsc 通道（Web / SSE 推送）；接收端已关闭时丢弃事件
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<AgentEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<AgentEvent>) -> Self {
        Self { tx }
    }
}

impl Observer for ChannelObserver {
    fn on_event(&self, event: &AgentEvent) -> Result<(), ObserverError> {
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

/// 通过 tracing 记录事件
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn on_event(&self, event: &AgentEvent) -> Result<(), ObserverError> {
        match event {
            AgentEvent::Error { error } | AgentEvent::ToolError { error, .. } => {
                tracing::warn!(kind = event.kind(), %error, "agent event");
            }
            _ => {
                let json = serde_json::to_string(event).unwrap_or_default();
                tracing::info!(kind = event.kind(), event = %json, "agent event");
            }
        }
        Ok(())
    }
}

/// 控制台输出：`Agent 🤖 : ...`
#[derive(Debug, Default)]
pub struct ConsoleObserver;

impl ConsoleObserver {
    pub fn format(event: &AgentEvent) -> String {
        match event {
            AgentEvent::Start => "Agent 🤖 : starting new iteration".to_string(),
            AgentEvent::Update { key, value } => format!("Agent ({key}) 🤖 : {value}"),
            AgentEvent::Retry { .. } => "Agent 🤖 : retrying the action...".to_string(),
            AgentEvent::Error { error } => format!("Agent 🤖 : {error}"),
            AgentEvent::ToolSuccess { tool, value } => format!("Agent ({tool}) 🤖 : {value}"),
            AgentEvent::ToolError { tool, error } => format!("Agent ({tool}) 🤖 : {error}"),
            AgentEvent::Success { text } => format!("Agent 🤖 : {text}"),
        }
    }
}

impl Observer for ConsoleObserver {
    fn on_event(&self, event: &AgentEvent) -> Result<(), ObserverError> {
        println!("{}", Self::format(event));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_in_registration_order() {
        let order = Mutex::new(Vec::new());
        let first = |e: &AgentEvent| -> Result<(), ObserverError> {
            order.lock().unwrap().push(format!("first:{}", e.kind()));
            Ok(())
        };
        let second = |e: &AgentEvent| -> Result<(), ObserverError> {
            order.lock().unwrap().push(format!("second:{}", e.kind()));
            Ok(())
        };
        let channel = EventChannel::new(&[&first, &second]);
        channel.emit(AgentEvent::Start).unwrap();
        channel.emit(AgentEvent::Success { text: "ok".into() }).unwrap();
        assert_eq!(
            *order.lock().unwrap(),
            vec!["first:start", "second:start", "first:success", "second:success"]
        );
    }

    #[test]
    fn test_failing_observer_stops_delivery() {
        let recorder = EventRecorder::new();
        let failing = |_: &AgentEvent| -> Result<(), ObserverError> { Err(ObserverError("boom".into())) };
        let channel = EventChannel::new(&[&failing, &recorder]);
        let err = channel.emit(AgentEvent::Start).unwrap_err();
        assert_eq!(err, AgentError::ObserverFailed("boom".into()));
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(AgentEvent::ToolSuccess {
            tool: "echo".into(),
            value: "hi".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "tool_success");
        assert_eq!(json["tool"], "echo");
    }

    #[tokio::test]
    async fn test_channel_observer_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let observer = ChannelObserver::new(tx);
        EventChannel::new(&[&observer]).emit(AgentEvent::Start).unwrap();
        assert_eq!(rx.recv().await, Some(AgentEvent::Start));
    }

    #[test]
    fn test_console_format() {
        let line = ConsoleObserver::format(&AgentEvent::Update {
            key: "final_answer".into(),
            value: "done".into(),
        });
        assert_eq!(line, "Agent (final_answer) 🤖 : done");
    }
}
