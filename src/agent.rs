//! Agent 构建与运行
//!
//! AgentBuilder 在构建时一次性注册能力并选定模型后端；构建后的 Agent 只读，每次 run 都使用全新的记忆与
//! 迭代状态，可并发被多个调用方使用（能力注册表通过 Arc 共享）。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::core::{AgentError, ExecutionConfig};
use crate::llm::LlmClient;
use crate::memory::{Memory, SlidingWindowMemory};
use crate::react::{AgentEvent, ChannelObserver, ModelBackend, Observer, Orchestrator, Planner};
use crate::tools::executor::DEFAULT_TIMEOUT_SECS;
use crate::tools::{Capability, CapabilityExecutor, CapabilityRegistry, RouterUpdateTool, WriteMailTool};

pub struct Agent {
    backend: Arc<dyn ModelBackend>,
    executor: CapabilityExecutor,
    max_messages: Option<usize>,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn capability_names(&self) -> Vec<String> {
        self.executor.registry().names()
    }

    /// 执行一次 run；配置了 max_messages 时使用定长窗口记忆
    pub async fn run(
        &self,
        prompt: &str,
        config: &ExecutionConfig,
        observers: &[&dyn Observer],
    ) -> Result<String, AgentError> {
        let orchestrator = Orchestrator::new(self.backend.as_ref(), &self.executor);
        match self.max_messages {
            Some(n) => {
                let mut memory = SlidingWindowMemory::new(n);
                orchestrator.run_with_memory(&mut memory, prompt, config, observers).await
            }
            None => orchestrator.run(prompt, config, observers).await,
        }
    }

    pub async fn run_with_memory(
        &self,
        memory: &mut dyn Memory,
        prompt: &str,
        config: &ExecutionConfig,
        observers: &[&dyn Observer],
    ) -> Result<String, AgentError> {
        Orchestrator::new(self.backend.as_ref(), &self.executor)
            .run_with_memory(memory, prompt, config, observers)
            .await
    }

    /// 流式运行：事件推送到 event_tx（Web / SSE 等前端）
    pub async fn run_with_events(
        &self,
        prompt: &str,
        config: &ExecutionConfig,
        event_tx: mpsc::UnboundedSender<AgentEvent>,
    ) -> Result<String, AgentError> {
        let observer = ChannelObserver::new(event_tx);
        self.run(prompt, config, &[&observer]).await
    }
}

/// Agent 构建器
pub struct AgentBuilder {
    registry: CapabilityRegistry,
    backend: Option<Arc<dyn ModelBackend>>,
    tool_timeout_secs: u64,
    max_messages: Option<usize>,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            registry: CapabilityRegistry::new(),
            backend: None,
            tool_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_messages: None,
        }
    }

    /// 按配置设置超时与记忆窗口，并注册应用能力（write_mail、router_update）
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AgentError> {
        let workspace = cfg.app.workspace();
        let builder = Self::new()
            .tool_timeout_secs(cfg.tools.tool_timeout_secs)
            .memory_window(cfg.memory.max_messages)
            .with_capability(WriteMailTool::new(workspace.join(&cfg.tools.outbox_dir)))?
            .with_capability(RouterUpdateTool::new(workspace.join(&cfg.tools.router_state_file)))?;
        Ok(builder)
    }

    /// 注册能力；重名返回 DuplicateCapability
    pub fn with_capability(mut self, capability: impl Capability + 'static) -> Result<Self, AgentError> {
        self.registry.register(capability)?;
        Ok(self)
    }

    pub fn with_backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.tool_timeout_secs = secs;
        self
    }

    pub fn memory_window(mut self, max_messages: Option<usize>) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        let backend = self
            .backend
            .ok_or_else(|| AgentError::ConfigError("no model backend configured".to_string()))?;
        Ok(Agent {
            backend,
            executor: CapabilityExecutor::new(
                Arc::new(self.registry),
                Duration::from_secs(self.tool_timeout_secs),
            ),
            max_messages: self.max_messages,
        })
    }

    /// 以 LLM 为模型后端构建：system prompt 中列出已注册的全部能力
    pub fn build_with_llm(self, llm: Arc<dyn LlmClient>, system_prompt: &str) -> Result<Agent, AgentError> {
        let planner = Planner::new(llm, system_prompt).with_capabilities(&self.registry);
        self.with_backend(Arc::new(planner)).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::react::{EventRecorder, ModelDecision, ScriptedBackend};
    use crate::tools::EchoTool;

    #[test]
    fn test_build_requires_backend() {
        let err = AgentBuilder::new().build().err().unwrap();
        assert!(matches!(err, AgentError::ConfigError(_)));
    }

    #[test]
    fn test_duplicate_capability_rejected_at_construction() {
        let err = AgentBuilder::new()
            .with_capability(EchoTool)
            .and_then(|b| b.with_capability(EchoTool))
            .err()
            .unwrap();
        assert_eq!(err, AgentError::DuplicateCapability("echo".into()));
    }

    #[test]
    fn test_from_config_registers_application_capabilities() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AppConfig::default();
        cfg.app.workspace_root = Some(dir.path().to_path_buf());
        let agent = AgentBuilder::from_config(&cfg)
            .unwrap()
            .with_backend(Arc::new(ScriptedBackend::default()))
            .build()
            .unwrap();
        assert_eq!(agent.capability_names(), vec!["router_update", "write_mail"]);
    }

    #[tokio::test]
    async fn test_mock_llm_round_trip() {
        let agent = AgentBuilder::new()
            .with_capability(EchoTool)
            .unwrap()
            .build_with_llm(Arc::new(MockLlmClient), "You are a test agent.")
            .unwrap();
        let recorder = EventRecorder::new();
        let answer = agent
            .run("ping", &ExecutionConfig::default(), &[&recorder])
            .await
            .unwrap();
        assert_eq!(answer, "Done. Observation from echo: Echo from Mock: ping");
        assert_eq!(
            recorder.kinds(),
            vec!["start", "update", "tool_success", "update", "success"]
        );
    }

    #[tokio::test]
    async fn test_run_with_events_streams_to_channel() {
        let agent = AgentBuilder::new()
            .with_backend(Arc::new(ScriptedBackend::repeating(Ok(ModelDecision::final_answer("ok")))))
            .build()
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let answer = agent.run_with_events("task", &ExecutionConfig::default(), tx).await.unwrap();
        assert_eq!(answer, "ok");
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind());
        }
        assert_eq!(kinds, vec!["start", "update", "success"]);
    }

    #[tokio::test]
    async fn test_memory_window_applies_per_run() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(ModelDecision::tool_call("echo", serde_json::json!({"text": "a"}))),
            Ok(ModelDecision::tool_call("echo", serde_json::json!({"text": "b"}))),
            Ok(ModelDecision::final_answer("done")),
        ]));
        let agent = AgentBuilder::new()
            .with_capability(EchoTool)
            .unwrap()
            .memory_window(Some(2))
            .with_backend(backend.clone())
            .build()
            .unwrap();
        agent.run("task", &ExecutionConfig::default(), &[]).await.unwrap();
        let last = backend.conversations().pop().unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].content, "task");
        assert_eq!(last[1].content, "b");
    }
}
