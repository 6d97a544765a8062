//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ONEAGENT__*` 覆盖（双下划线表示嵌套，如 `ONEAGENT__EXECUTION__MAX_ITERATIONS=8`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::ExecutionConfig;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub execution: ExecutionConfig,
    pub memory: MemorySection,
    pub tools: ToolsSection,
    pub prompts: PromptsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 工作目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
}

impl AppSection {
    pub fn workspace(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("workspace"))
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [memory] 段：max_messages 未设置时使用无上限记忆
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MemorySection {
    pub max_messages: Option<usize>,
}

/// [tools] 段：能力超时与输出位置（相对路径基于 workspace）
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次能力调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,
    #[serde(default = "default_router_state_file")]
    pub router_state_file: PathBuf,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            outbox_dir: default_outbox_dir(),
            router_state_file: default_router_state_file(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("outbox")
}

fn default_router_state_file() -> PathBuf {
    PathBuf::from("routers.json")
}

/// [prompts] 段：指令与 transcript 文件
#[derive(Debug, Clone, Deserialize)]
pub struct PromptsSection {
    #[serde(default = "default_instruction_llm")]
    pub instruction_llm: PathBuf,
    #[serde(default = "default_instruction_agent")]
    pub instruction_agent: PathBuf,
    #[serde(default = "default_transcript")]
    pub transcript: PathBuf,
}

impl Default for PromptsSection {
    fn default() -> Self {
        Self {
            instruction_llm: default_instruction_llm(),
            instruction_agent: default_instruction_agent(),
            transcript: default_transcript(),
        }
    }
}

fn default_instruction_llm() -> PathBuf {
    PathBuf::from("prompts/instructionLLM.md")
}

fn default_instruction_agent() -> PathBuf {
    PathBuf::from("prompts/instructionOneAgent.md")
}

fn default_transcript() -> PathBuf {
    PathBuf::from("prompts/transcript.md")
}

/// 从 config 目录加载配置，环境变量 ONEAGENT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ONEAGENT__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ONEAGENT")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.execution, ExecutionConfig::new(5, 5, 5));
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
        assert!(cfg.memory.max_messages.is_none());
        assert_eq!(cfg.app.workspace(), PathBuf::from("workspace"));
    }

    #[test]
    fn test_load_from_file_overrides_execution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(
            &path,
            "[execution]\nmax_retries_per_step = 2\ntotal_max_retries = 4\nmax_iterations = 8\n\n[memory]\nmax_messages = 16\n",
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.execution, ExecutionConfig::new(2, 4, 8));
        assert_eq!(cfg.memory.max_messages, Some(16));
        assert_eq!(cfg.llm.timeouts.request, 60);
    }
}
