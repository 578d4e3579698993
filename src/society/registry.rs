//! 智能体注册表与调度器
//!
//! 按名称持有 Arc<dyn Agent>；register 拒绝重名（启动期致命错误）并把注册表
//! 弱引用绑定进智能体；dispatch 查找收件人并调用其 receive，把返回值原样带
//! 回。收件人不存在记 error 日志并返回 Ok(None)，不恐慌也不报错。调度可
//! 重入：decide 内部的 send 会在同一调用树更深处再次进入 dispatch。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::core::AgentError;
use crate::society::actor::Agent;
use crate::society::message::AgentMessage;

/// 注册表句柄：克隆廉价，内部共享同一份状态
#[derive(Clone, Default)]
pub struct AgentRegistry {
    inner: Arc<RegistryInner>,
}

/// 共享状态；AgentCore 持有它的弱引用以便 send 转发
#[derive(Default)]
pub(crate) struct RegistryInner {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册智能体并绑定注册表引用；重名返回 DuplicateAgent，原绑定不变
    pub fn register(&self, agent: Arc<dyn Agent>) -> Result<(), AgentError> {
        let name = agent.name().to_string();
        let mut agents = self.inner.agents.write().unwrap();
        if agents.contains_key(&name) {
            return Err(AgentError::DuplicateAgent(name));
        }
        agent.core().bind_registry(Arc::downgrade(&self.inner));
        agents.insert(name.clone(), agent);
        tracing::info!(agent = %name, "agent registered");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.inner.agents.read().unwrap().get(name).cloned()
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.inner.agents.read().unwrap().keys().cloned().collect()
    }

    /// 投递一条消息并返回收件人的回复
    pub async fn dispatch(&self, message: AgentMessage) -> Result<Option<String>, AgentError> {
        self.inner.dispatch(message).await
    }
}

impl RegistryInner {
    pub(crate) async fn dispatch(
        &self,
        message: AgentMessage,
    ) -> Result<Option<String>, AgentError> {
        // 先取出收件人再释放读锁，receive 可能长时间 await
        let recipient = self.agents.read().unwrap().get(&message.recipient).cloned();

        tracing::info!(
            from = %message.sender,
            to = %message.recipient,
            kind = %message.kind,
            context_id = %message.context_id,
            "dispatching message"
        );

        let Some(recipient) = recipient else {
            tracing::error!(
                recipient = %message.recipient,
                context_id = %message.context_id,
                "recipient not registered, message dropped"
            );
            return Ok(None);
        };

        recipient.receive(message).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::society::actor::AgentCore;
    use crate::society::message::MessageKind;

    /// 固定回复并记录调用次数的测试智能体
    struct FixedReplyAgent {
        core: AgentCore,
        reply: Option<String>,
        calls: Mutex<usize>,
    }

    impl FixedReplyAgent {
        fn new(name: &str, reply: Option<&str>) -> Self {
            Self {
                core: AgentCore::new(name, "test persona"),
                reply: reply.map(String::from),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Agent for FixedReplyAgent {
        fn core(&self) -> &AgentCore {
            &self.core
        }

        async fn decide(&self, _message: &AgentMessage) -> Result<Option<String>, AgentError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_dispatch_invokes_decide_once_and_returns_reply_unchanged() {
        let registry = AgentRegistry::new();
        let agent = Arc::new(FixedReplyAgent::new("Echoer", Some("pong")));
        registry.register(agent.clone()).unwrap();

        let reply = registry
            .dispatch(AgentMessage::request("User", "Echoer", "ping"))
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("pong"));
        assert_eq!(*agent.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_to_unknown_recipient_returns_none() {
        let registry = AgentRegistry::new();
        let reply = registry
            .dispatch(AgentMessage::request("User", "Nobody", "hello"))
            .await
            .unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails_and_keeps_original() {
        let registry = AgentRegistry::new();
        let first = Arc::new(FixedReplyAgent::new("Twin", Some("original")));
        let second = Arc::new(FixedReplyAgent::new("Twin", Some("impostor")));
        registry.register(first).unwrap();

        let err = registry.register(second).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateAgent(name) if name == "Twin"));

        let reply = registry
            .dispatch(AgentMessage::request("User", "Twin", "who are you"))
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("original"));
    }

    #[tokio::test]
    async fn test_registered_agent_can_send_through_bound_registry() {
        let registry = AgentRegistry::new();
        let alice = Arc::new(FixedReplyAgent::new("Alice", None));
        let bob = Arc::new(FixedReplyAgent::new("Bob", Some("hi Alice")));
        registry.register(alice.clone()).unwrap();
        registry.register(bob).unwrap();

        let reply = alice
            .core()
            .send("Bob", "hello", MessageKind::Request, Some("chain-7"))
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("hi Alice"));
    }
}
