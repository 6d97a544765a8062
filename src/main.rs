//! Bee OneAgent
//!
//! 1. 读取 transcript，用 LLM 按 instructionLLM 做摘要；
//! 2. 以 instructionOneAgent + 摘要作为 prompt，运行带 router_update / write_mail 能力的 Agent。
//!
//! 用法：`bee-oneagent [config.toml]`

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use bee_oneagent::config::{load_config, AppConfig};
use bee_oneagent::llm::create_llm_from_config;
use bee_oneagent::observability;
use bee_oneagent::react::{ConsoleObserver, LoggingObserver, Planner};
use bee_oneagent::tools::EchoTool;
use bee_oneagent::AgentBuilder;

const SYSTEM_PROMPT: &str =
    "You are Bee, a careful network operations agent. Use the available tools to act; never invent tool names.";

/// 读取 prompt 文件，并把字面量 `\n` 还原为换行
fn read_prompt(path: &Path) -> anyhow::Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompt file {}", path.display()))?;
    Ok(raw.replace("\\n", "\n"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let workspace = cfg.app.workspace();
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("Failed to create workspace {}", workspace.display()))?;

    let llm = create_llm_from_config(&cfg);

    // Step 1: transcript 摘要
    let instruction_llm = read_prompt(&cfg.prompts.instruction_llm)?;
    let transcript = read_prompt(&cfg.prompts.transcript)?;
    println!("Transcript:\n{}\n", transcript);

    let summary = Planner::new(llm.clone(), "")
        .summarize(&instruction_llm, &transcript)
        .await
        .context("Transcript summary generation failed")?;
    if summary.is_empty() {
        bail!("Transcript summary generation failed: no response received");
    }
    println!("LLM 🤖 (text) : {}\n", summary);

    // Step 2: Agent 执行变更并写邮件
    let mut builder = AgentBuilder::from_config(&cfg)?;
    if cfg.llm.provider.eq_ignore_ascii_case("mock") {
        builder = builder.with_capability(EchoTool)?;
    }
    let agent = builder.build_with_llm(llm.clone(), SYSTEM_PROMPT)?;

    let instruction_agent = read_prompt(&cfg.prompts.instruction_agent)?;
    let prompt = format!("{}{}", instruction_agent, summary);
    println!("Prompt:\n{}\n", prompt);

    let console = ConsoleObserver;
    let logging = LoggingObserver;
    let result = agent.run(&prompt, &cfg.execution, &[&console, &logging]).await;

    let (prompt_tokens, completion_tokens, total_tokens) = llm.token_usage();
    tracing::info!(prompt_tokens, completion_tokens, total_tokens, "token usage");

    match result {
        Ok(text) => println!("Agent 🤖 : {}", text),
        Err(e) => {
            tracing::error!(error = %e, "agent run failed");
            std::process::exit(1);
        }
    }

    Ok(())
}
