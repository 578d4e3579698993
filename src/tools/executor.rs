//! 工具执行器
//!
//! 持有 ToolRegistry，execute(tool_name, args) 查找并调用工具，将结果映射为
//! AgentError（UnknownTool / ToolExecutionFailed）；每次调用输出结构化审计
//! 日志（JSON）。执行器本身不设超时，外部 I/O 的时限由各工具体自行约束。

use std::sync::Arc;
use std::time::Instant;

use crate::core::AgentError;
use crate::tools::{Tool, ToolRegistry};

/// 审计日志中参数预览的最大字符数
const ARGS_PREVIEW_CHARS: usize = 200;

/// 工具执行器：统一查找、调用、审计与错误映射
pub struct ToolExecutor {
    registry: ToolRegistry,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// 执行指定工具；未注册返回 UnknownTool，工具返回 Err 则转为
    /// ToolExecutionFailed；输出 JSON 审计日志
    pub async fn execute(&self, tool_name: &str, args: serde_json::Value) -> Result<String, AgentError> {
        let Some(tool) = self.registry.get(tool_name) else {
            tracing::warn!(tool = %tool_name, "unknown tool requested");
            return Err(AgentError::UnknownTool(tool_name.to_string()));
        };

        let preview = preview_json(&args);
        let started = Instant::now();
        let result = tool.execute(args).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "outcome": if result.is_ok() { "ok" } else { "error" },
            "elapsed_ms": elapsed_ms,
            "args": preview,
        });
        tracing::info!(audit = %audit, "tool");

        result.map_err(AgentError::ToolExecutionFailed)
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.registry.tool_descriptions()
    }
}

fn preview_json(value: &serde_json::Value) -> String {
    let s = value.to_string();
    if s.chars().count() > ARGS_PREVIEW_CHARS {
        let cut: String = s.chars().take(ARGS_PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        s
    }
}
