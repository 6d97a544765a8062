//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod factory;
pub mod mock;
pub mod openai;
pub mod traits;

pub use factory::{create_llm_from_config, DEEPSEEK_BASE_URL};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{LlmClient, LlmError};
