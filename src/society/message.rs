//! 智能体消息信封
//!
//! 社会内一切通信的载体：sender / recipient / content / kind / context_id /
//! timestamp / metadata。构造后不可变；委派链沿用同一 context_id 以便按
//! 关联 ID 追踪整条调用链。

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 消息类别（闭集）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Request,
    Response,
    Info,
    Error,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::Request => "REQUEST",
            MessageKind::Response => "RESPONSE",
            MessageKind::Info => "INFO",
            MessageKind::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// 单条智能体消息：构造即定值，不提供修改入口
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentMessage {
    pub sender: String,
    pub recipient: String,
    pub content: String,
    pub kind: MessageKind,
    /// 关联 ID：新消息默认取新 UUID，委派时沿用入站消息的值
    pub context_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AgentMessage {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            content: content.into(),
            kind,
            context_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// 新任务消息的默认类别是 Request
    pub fn request(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(sender, recipient, content, MessageKind::Request)
    }

    /// 沿用指定关联 ID（委派链）
    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = context_id.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
