//! 按配置创建 LLM 客户端
//!
//! provider = "deepseek" 或存在 DEEPSEEK_API_KEY 时走 DeepSeek 兼容端点；provider = "openai" 且有
//! OPENAI_API_KEY 时走 OpenAI（可配 base_url）；否则退回 Mock。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = cfg.llm.timeouts.request;
    if provider == "mock" {
        tracing::info!("Using Mock LLM");
        return Arc::new(MockLlmClient);
    }

    let deepseek_key = std::env::var("DEEPSEEK_API_KEY").ok();
    let openai_key = std::env::var("OPENAI_API_KEY").ok();

    if provider == "deepseek" || (deepseek_key.is_some() && provider != "openai") {
        if let Some(key) = deepseek_key.or(openai_key) {
            let base = cfg.llm.base_url.as_deref().unwrap_or(DEEPSEEK_BASE_URL);
            tracing::info!(model = %cfg.llm.model, "Using DeepSeek LLM");
            return Arc::new(
                OpenAiClient::new(Some(base), &cfg.llm.model, Some(key.as_str())).with_request_timeout(timeout),
            );
        }
    } else if let Some(key) = openai_key {
        tracing::info!(model = %cfg.llm.model, "Using OpenAI LLM");
        return Arc::new(
            OpenAiClient::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, Some(key.as_str()))
                .with_request_timeout(timeout),
        );
    }

    tracing::warn!(provider = %provider, "No API key set or provider unknown, using Mock LLM");
    Arc::new(MockLlmClient)
}
