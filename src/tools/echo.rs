//! Echo 工具（联通性检查用）

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

/// 原样回显输入文本
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text back unchanged. Args: {\"text\": \"message\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to echo back" }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let text = args.get("text").and_then(Value::as_str).unwrap_or("(empty)");
        Ok(text.to_string())
    }
}
