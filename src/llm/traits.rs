//! LLM 后端的统一 trait
//!
//! 所有后端（OpenAI 兼容 / Mock / Scripted）实现 LlmClient：complete（对话
//! 补全）、generate（单条 prompt 短输出，供意图分类等低温场景）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 消息角色，与 chat API 的取值一一对应
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 对话转录中的单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// generate 的采样选项。None 表示沿用后端默认值。
#[derive(Clone, Debug, Default)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// LLM 客户端 trait：对话补全与单 prompt 补全
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 对话补全：整段转录进，单段文本出
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 单 prompt 补全，支持温度与输出长度上限（意图分类用）
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, String>;

    /// 累计 token 用量 (prompt, completion, total)；不计量的实现用默认零值
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
