//! Mock 与 Scripted LLM 客户端（用于测试与离线运行，无需 API）
//!
//! MockLlmClient 回显最后一条 User 消息；ScriptedLlmClient 按脚本顺序弹出
//! 预置回复并记录每次调用，供断言转录与采样参数。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{GenerateOptions, LlmClient, Message, Role};

/// Mock 客户端：complete 回显用户最后一条消息，generate 固定分类为 CHAT
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("Echo from Mock: {}", last_user))
    }

    async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String, String> {
        Ok("CHAT".to_string())
    }
}

/// Scripted 客户端：按顺序弹出预置回复（complete 与 generate 共用同一队列，
/// 与调用发生顺序一一对应），脚本耗尽后返回 Err。
#[derive(Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<String>>,
    /// 每次 complete 收到的完整转录
    pub complete_calls: Mutex<Vec<Vec<Message>>>,
    /// 每次 generate 收到的 (prompt, options)
    pub generate_calls: Mutex<Vec<(String, GenerateOptions)>>,
}

impl ScriptedLlmClient {
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            complete_calls: Mutex::new(Vec::new()),
            generate_calls: Mutex::new(Vec::new()),
        }
    }

    fn pop_reply(&self) -> Result<String, String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| "scripted replies exhausted".to_string())
    }

    /// 剩余未消费的脚本条数
    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.complete_calls.lock().unwrap().push(messages.to_vec());
        self.pop_reply()
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, String> {
        self.generate_calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), options.clone()));
        self.pop_reply()
    }
}
