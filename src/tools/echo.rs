//! Echo 能力（测试与演示用）

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Capability;

/// Echo 能力：回显 text 参数
pub struct EchoTool;

#[async_trait]
impl Capability for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text (for testing). Args: {\"text\": \"message\"}"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" }
            },
            "required": ["text"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<String, String> {
        args.get("text")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| "missing text".to_string())
    }
}
