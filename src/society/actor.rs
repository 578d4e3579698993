//! 智能体契约
//!
//! Agent trait 只要求实现 core()（共享状态）与 decide()（策略钩子）；
//! receive() 的默认实现先记录收件历史再调用 decide。AgentCore 持有名称、
//! 人设、工具执行器、收件箱与注册表弱引用，send() 经注册表转发并把对方的
//! 回复作为返回值带回（同步调用链，无队列）。

use std::sync::{Arc, Mutex, OnceLock, Weak};

use async_trait::async_trait;

use crate::core::AgentError;
use crate::society::message::{AgentMessage, MessageKind};
use crate::society::registry::RegistryInner;
use crate::tools::ToolExecutor;

/// 智能体 trait：以 Arc<dyn Agent> 形式注册与调度
#[async_trait]
pub trait Agent: Send + Sync {
    /// 共享状态（名称、人设、收件箱、注册表绑定）
    fn core(&self) -> &AgentCore;

    /// 策略钩子：对一条入站消息给出回复文本；Ok(None) 表示无回复
    async fn decide(&self, message: &AgentMessage) -> Result<Option<String>, AgentError>;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn persona(&self) -> &str {
        self.core().persona()
    }

    /// 接收入站消息：记录历史后交给 decide
    async fn receive(&self, message: AgentMessage) -> Result<Option<String>, AgentError> {
        self.core().record_inbound(&message);
        self.decide(&message).await
    }
}

/// 每个智能体共享的状态与通信能力
pub struct AgentCore {
    name: String,
    persona: String,
    tools: Option<Arc<ToolExecutor>>,
    /// 收件历史（只追加）
    inbox: Mutex<Vec<AgentMessage>>,
    /// 注册表一次性绑定；弱引用避免与注册表互持强引用
    registry: OnceLock<Weak<RegistryInner>>,
}

impl AgentCore {
    pub fn new(name: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persona: persona.into(),
            tools: None,
            inbox: Mutex::new(Vec::new()),
            registry: OnceLock::new(),
        }
    }

    pub fn with_tools(mut self, tools: Arc<ToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn tools(&self) -> Option<&Arc<ToolExecutor>> {
        self.tools.as_ref()
    }

    /// 注册时由注册表调用；重复绑定保持首次绑定不变
    pub(crate) fn bind_registry(&self, registry: Weak<RegistryInner>) {
        let _ = self.registry.set(registry);
    }

    pub(crate) fn record_inbound(&self, message: &AgentMessage) {
        self.inbox.lock().unwrap().push(message.clone());
    }

    /// 收件历史快照（测试与诊断用）
    pub fn inbox(&self) -> Vec<AgentMessage> {
        self.inbox.lock().unwrap().clone()
    }

    /// 构造消息并经注册表同步投递；对方的回复作为返回值带回。
    /// context_id 传 Some 表示延续既有委派链，None 则新开链。
    /// 尚未注册到任何注册表时返回 NotRegistered。
    pub async fn send(
        &self,
        recipient: &str,
        content: &str,
        kind: MessageKind,
        context_id: Option<&str>,
    ) -> Result<Option<String>, AgentError> {
        let registry = self
            .registry
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| AgentError::NotRegistered(self.name.clone()))?;

        let mut message = AgentMessage::new(&self.name, recipient, content, kind);
        if let Some(id) = context_id {
            message = message.with_context_id(id);
        }
        registry.dispatch(message).await
    }
}
