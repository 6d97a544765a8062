//! 编排主循环
//!
//! Idle -> Deciding -> (ToolDispatch | Finalizing) -> Deciding ... | Terminated。
//! 每轮向模型后端要一个决策：ToolCall 则解析、校验、调用能力并把输出写回记忆；FinalAnswer 则结束。
//! 模型决策与能力调用各算一步，各自成功时步骤重试计数清零；迭代数只统计成功完成的 ToolDispatch。
//! 步骤级失败由 RetryPolicy 吸收（失败的尝试不写记忆，用同一份记忆重新 Deciding），
//! 预算耗尽、迭代数用尽、不可恢复的后端错误、观察者失败则终止。

use tracing::Instrument;

use crate::core::{AgentError, ExecutionConfig, IterationState, RetryPolicy};
use crate::memory::{Memory, Message, UnconstrainedMemory};
use crate::react::{AgentEvent, EventChannel, ModelBackend, ModelDecision, Observer};
use crate::tools::CapabilityExecutor;

/// 编排器：借用模型后端与能力执行器，本身无状态，可重复 run
pub struct Orchestrator<'a> {
    backend: &'a dyn ModelBackend,
    executor: &'a CapabilityExecutor,
    policy: RetryPolicy,
}

impl<'a> Orchestrator<'a> {
    pub fn new(backend: &'a dyn ModelBackend, executor: &'a CapabilityExecutor) -> Self {
        Self {
            backend,
            executor,
            policy: RetryPolicy::new(),
        }
    }

    /// 用全新的无上限记忆执行一次 run
    pub async fn run(
        &self,
        prompt: &str,
        config: &ExecutionConfig,
        observers: &[&dyn Observer],
    ) -> Result<String, AgentError> {
        let mut memory = UnconstrainedMemory::new();
        self.run_with_memory(&mut memory, prompt, config, observers).await
    }

    /// 在调用方提供的记忆上执行一次 run（run 结束后调用方可读取完整对话）
    pub async fn run_with_memory(
        &self,
        memory: &mut dyn Memory,
        prompt: &str,
        config: &ExecutionConfig,
        observers: &[&dyn Observer],
    ) -> Result<String, AgentError> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("agent_run", %run_id);
        async {
            let channel = EventChannel::new(observers);
            let result = self.run_loop(memory, prompt, config, &channel).await;
            if let Err(e @ AgentError::ObserverFailed(_)) = &result {
                tracing::error!(error = %e, "observer failed, aborting run");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_loop(
        &self,
        memory: &mut dyn Memory,
        prompt: &str,
        config: &ExecutionConfig,
        channel: &EventChannel<'_>,
    ) -> Result<String, AgentError> {
        tracing::info!(
            max_retries_per_step = config.max_retries_per_step,
            total_max_retries = config.total_max_retries,
            max_iterations = config.max_iterations,
            "run started"
        );
        channel.emit(AgentEvent::Start)?;
        memory.append(Message::user(prompt));
        let mut state = IterationState::new();

        loop {
            // 只统计已完成的迭代；失败重试回到 Deciding 不占迭代数
            if state.iterations_exhausted(config) {
                return Err(terminate(channel, AgentError::MaxIterationsExceeded(config.max_iterations)));
            }

            let decision = match self.backend.decide(memory.snapshot()).await {
                Ok(d) => d,
                Err(e) => {
                    state = self.absorb_failure(state, config, channel, e)?;
                    continue;
                }
            };
            // 模型决策成功即完成一步；随后的能力调用另起一步，拥有完整的步骤预算
            state = state.complete_step();

            match decision {
                ModelDecision::FinalAnswer { text } => {
                    channel.emit(AgentEvent::Update {
                        key: "final_answer".to_string(),
                        value: text.clone(),
                    })?;
                    memory.append(Message::assistant(text.clone()));
                    tracing::info!(
                        iterations = state.iteration_index,
                        retries = state.total_retry_count,
                        "run finished"
                    );
                    channel.emit(AgentEvent::Success { text: text.clone() })?;
                    return Ok(text);
                }
                ModelDecision::ToolCall {
                    capability,
                    arguments,
                } => match self.dispatch(memory, channel, capability, arguments).await {
                    Ok(()) => {
                        state = state.complete_iteration();
                        tracing::debug!(iteration = state.iteration_index, "iteration completed");
                    }
                    Err(e) => state = self.absorb_failure(state, config, channel, e)?,
                },
            }
        }
    }

    /// ToolDispatch：解析、校验、调用；成功时把输出写入记忆
    async fn dispatch(
        &self,
        memory: &mut dyn Memory,
        channel: &EventChannel<'_>,
        capability: String,
        arguments: serde_json::Value,
    ) -> Result<(), AgentError> {
        tracing::debug!(capability = %capability, "tool call");
        channel.emit(AgentEvent::Update {
            key: "tool_call".to_string(),
            value: serde_json::json!({ "tool": capability, "args": arguments }).to_string(),
        })?;

        let resolved = self.executor.prepare(&capability, &arguments)?;
        match self.executor.invoke(resolved.as_ref(), arguments).await {
            Ok(output) => {
                memory.append(Message::tool(capability.clone(), output.clone()));
                channel.emit(AgentEvent::ToolSuccess {
                    tool: capability,
                    value: output,
                })?;
                Ok(())
            }
            Err(e) => {
                channel.emit(AgentEvent::ToolError {
                    tool: capability,
                    error: e.to_string(),
                })?;
                Err(e)
            }
        }
    }

    /// 处理一次失败：预算允许则记一次重试并返回新状态，否则返回终止错误（已发出最后的 Error 事件）。
    /// 步骤级 Error 事件只在随后有 Retry 时发出；能力调用失败已由 ToolError 报告。
    fn absorb_failure(
        &self,
        state: IterationState,
        config: &ExecutionConfig,
        channel: &EventChannel<'_>,
        err: AgentError,
    ) -> Result<IterationState, AgentError> {
        if matches!(err, AgentError::ObserverFailed(_)) {
            return Err(err);
        }
        if !err.is_step_failure() {
            return Err(terminate(channel, err));
        }
        if !self.policy.can_retry(&state, config) {
            return Err(terminate(
                channel,
                AgentError::RetriesExhausted {
                    step_retries: state.step_retry_count,
                    total_retries: state.total_retry_count,
                    last_error: err.to_string(),
                },
            ));
        }

        if !matches!(
            err,
            AgentError::CapabilityFailed { .. } | AgentError::CapabilityTimeout(_)
        ) {
            channel.emit(AgentEvent::Error { error: err.to_string() })?;
        }
        let state = self.policy.record_retry(state);
        tracing::warn!(
            error = %err,
            step_retries = state.step_retry_count,
            total_retries = state.total_retry_count,
            "step failed, retrying"
        );
        channel.emit(AgentEvent::Retry {
            step_retries: state.step_retry_count,
            total_retries: state.total_retry_count,
        })?;
        Ok(state)
    }
}

/// 终止 run：发出最后的 Error 事件，返回 run 的错误（观察者失败时改为 ObserverFailed）
fn terminate(channel: &EventChannel<'_>, err: AgentError) -> AgentError {
    tracing::error!(error = %err, "run terminated");
    match channel.emit(AgentEvent::Error {
        error: err.to_string(),
    }) {
        Ok(()) => err,
        Err(observer_err) => observer_err,
    }
}
