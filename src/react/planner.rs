//! Planner：基于 LLM 的模型后端
//!
//! 拼接 system prompt（基础指令 + 可用能力及其参数 schema + 调用格式），调用 LLM，
//! 再由 parse_llm_output 把回复解析为 ToolCall 或 FinalAnswer。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::AgentError;
use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};
use crate::react::{ModelBackend, ModelDecision};
use crate::tools::{tool_call_schema_json, CapabilityRegistry};

/// LLM 返回的 Tool Call（简化 JSON：{"tool": "write_mail", "args": {...}}）
#[derive(Debug, Clone, Deserialize)]
struct ToolCallJson {
    tool: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// 解析 LLM 输出：含 "tool" 字段的 JSON 为 ToolCall，其余为 FinalAnswer；
/// 看起来是 tool call 但 JSON 非法时返回可重试的 Backend 错误
pub fn parse_llm_output(output: &str) -> Result<ModelDecision, AgentError> {
    let trimmed = output.trim();

    // 提取 JSON 块（```json ... ``` 或纯 JSON）
    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            &trimmed[start..=end]
        } else {
            return Ok(ModelDecision::final_answer(trimmed));
        }
    } else {
        return Ok(ModelDecision::final_answer(trimmed));
    };

    if !json_str.contains("\"tool\"") {
        return Ok(ModelDecision::final_answer(trimmed));
    }

    let parsed: ToolCallJson = serde_json::from_str(json_str)
        .map_err(|e| AgentError::Backend(format!("malformed tool call ({}): {}", e, json_str)))?;

    if parsed.tool.trim().is_empty() {
        return Ok(ModelDecision::final_answer(trimmed));
    }
    let args = if parsed.args.is_null() {
        serde_json::json!({})
    } else {
        parsed.args
    };
    Ok(ModelDecision::tool_call(parsed.tool, args))
}

fn map_llm_error(e: LlmError) -> AgentError {
    if e.is_retriable() {
        AgentError::Backend(e.to_string())
    } else {
        AgentError::UnrecoverableBackend(e.to_string())
    }
}

/// Planner：持有 LLM 与完整 system prompt
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    /// 在基础指令后追加可用能力与调用格式说明
    pub fn with_capabilities(mut self, registry: &CapabilityRegistry) -> Self {
        self.system_prompt = format!(
            "{}\n\n## Available tools\n{}\n\n## Tool call format\n\
            To call a tool, reply with exactly one JSON object and nothing else:\n\
            {{\"tool\": \"<name>\", \"args\": {{...}}}}\n\
            Schema:\n{}\n\n\
            When the task is complete, reply with the final answer as plain text (no JSON).",
            self.system_prompt,
            registry.to_schema_json(),
            tool_call_schema_json()
        );
        self
    }

    /// system + 对话；工具输出转为 user 消息
    fn to_llm_messages(&self, conversation: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        if !self.system_prompt.is_empty() {
            messages.push(Message::system(self.system_prompt.clone()));
        }
        messages.extend(conversation.iter().map(|m| match m.role {
            Role::Tool => Message::user(m.observation_text()),
            _ => m.clone(),
        }));
        messages
    }

    /// 单次 LLM 调用：按 instruction 对 transcript 做摘要，结果作为 Agent 的输入
    pub async fn summarize(&self, instruction: &str, transcript: &str) -> Result<String, AgentError> {
        let messages = vec![
            Message::system(instruction.to_string()),
            Message::user(transcript.to_string()),
        ];
        let summary = self.llm.complete(&messages).await.map_err(map_llm_error)?;
        Ok(summary.trim().to_string())
    }
}

#[async_trait]
impl ModelBackend for Planner {
    async fn decide(&self, conversation: &[Message]) -> Result<ModelDecision, AgentError> {
        let messages = self.to_llm_messages(conversation);
        for m in &messages {
            tracing::debug!(role = ?m.role, content = %m.content, "llm input");
        }
        let output = match self.llm.complete(&messages).await {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(error = %e, retriable = e.is_retriable(), "llm error");
                return Err(map_llm_error(e));
            }
        };
        tracing::debug!(output = %output, "llm output");
        parse_llm_output(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::EchoTool;
    use serde_json::json;

    #[test]
    fn test_parse_plain_text_is_final_answer() {
        let d = parse_llm_output("  The router was restarted.  ").unwrap();
        assert_eq!(d, ModelDecision::final_answer("The router was restarted."));
    }

    #[test]
    fn test_parse_tool_call() {
        let d = parse_llm_output(r#"{"tool": "echo", "args": {"text": "hi"}}"#).unwrap();
        assert_eq!(d, ModelDecision::tool_call("echo", json!({"text": "hi"})));
    }

    #[test]
    fn test_parse_fenced_tool_call_without_args() {
        let d = parse_llm_output("Thought: check\n```json\n{\"tool\": \"echo\"}\n```").unwrap();
        assert_eq!(d, ModelDecision::tool_call("echo", json!({})));
    }

    #[test]
    fn test_parse_braces_without_tool_is_final_answer() {
        let d = parse_llm_output("Set {mtu} to 1500").unwrap();
        assert!(matches!(d, ModelDecision::FinalAnswer { .. }));
    }

    #[test]
    fn test_parse_malformed_tool_call_is_retriable() {
        let err = parse_llm_output(r#"{"tool": "echo", "args": {"text": }"#).unwrap_err();
        assert!(matches!(err, AgentError::Backend(_)));
        assert!(err.is_step_failure());
    }

    #[tokio::test]
    async fn test_decide_sends_system_and_observations() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok("all done".to_string())]));
        let mut registry = CapabilityRegistry::new();
        registry.register(EchoTool).unwrap();
        let planner = Planner::new(llm.clone(), "You are a network assistant.").with_capabilities(&registry);

        let decision = planner
            .decide(&[Message::user("task"), Message::tool("echo", "hi")])
            .await
            .unwrap();
        assert_eq!(decision, ModelDecision::final_answer("all done"));

        let sent = &llm.calls()[0];
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0].content.contains("\"echo\""));
        assert_eq!(sent[2].content, "Observation from echo: hi");
    }

    #[tokio::test]
    async fn test_decide_maps_llm_errors() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            Err(LlmError::Network("reset".into())),
            Err(LlmError::Auth("bad key".into())),
        ]));
        let planner = Planner::new(llm, "");
        assert!(matches!(planner.decide(&[]).await, Err(AgentError::Backend(_))));
        assert!(matches!(
            planner.decide(&[]).await,
            Err(AgentError::UnrecoverableBackend(_))
        ));
    }

    #[tokio::test]
    async fn test_summarize_trims_output() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok("  summary \n".to_string())]));
        let planner = Planner::new(llm.clone(), "");
        let s = planner.summarize("Summarize:", "long transcript").await.unwrap();
        assert_eq!(s, "summary");
        assert_eq!(llm.calls()[0][0].content, "Summarize:");
    }
}
