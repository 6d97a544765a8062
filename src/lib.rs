//! Bee OneAgent - 单 LLM 单 Agent 编排引擎
//!
//! 模块划分：
//! - **agent**: Agent 构建器与运行入口
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、执行上限与重试预算
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 单次 run 的对话记忆
//! - **observability**: 日志初始化
//! - **react**: 模型后端、Planner、生命周期事件、编排主循环
//! - **tools**: 能力 trait、注册表、schema 校验、执行器与内置能力

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use agent::{Agent, AgentBuilder};
pub use core::{AgentError, ExecutionConfig};
pub use react::{AgentEvent, ModelBackend, ModelDecision, Observer};
