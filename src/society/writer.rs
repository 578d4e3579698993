//! Writer：单次成稿
//!
//! 人设作 system、请求内容作 user，调用一次 LLM 并把结果原样返回。
//! 不用工具，不做委派。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::society::actor::{Agent, AgentCore};
use crate::society::message::AgentMessage;

pub const WRITER_NAME: &str = "Writer";

pub const DEFAULT_WRITER_PERSONA: &str =
    "你是专业作家。把给定的信息整理成结构清晰、易于阅读的文章。";

/// 撰写专家智能体
pub struct WriterAgent {
    core: AgentCore,
    llm: Arc<dyn LlmClient>,
}

impl WriterAgent {
    pub fn new(llm: Arc<dyn LlmClient>, persona: impl Into<String>) -> Self {
        Self {
            core: AgentCore::new(WRITER_NAME, persona),
            llm,
        }
    }
}

#[async_trait]
impl Agent for WriterAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn decide(&self, message: &AgentMessage) -> Result<Option<String>, AgentError> {
        let messages = [
            Message::system(self.core.persona().to_string()),
            Message::user(message.content.clone()),
        ];
        let draft = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::LlmError)?;
        Ok(Some(draft))
    }
}
