//! Agent 错误类型
//!
//! 统一贯穿智能体社会、工具执行与推理循环的错误通道。LLM 调用失败原样
//! 上抛，不在内部重试；工具失败只在循环/Researcher 层转为观察文本。

use thiserror::Error;

/// 编排过程中可能出现的错误（注册、调度、LLM、工具、路径逃逸等）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 同名智能体重复注册，注册表保持原绑定不变
    #[error("Agent '{0}' is already registered")]
    DuplicateAgent(String),

    /// 智能体尚未注册到任何注册表就调用了 send
    #[error("Agent '{0}' is not registered in any registry")]
    NotRegistered(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Path escape blocked: {0}")]
    PathEscape(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}
