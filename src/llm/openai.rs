//! 面向 OpenAI 兼容端点的 LlmClient 实现
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；同一实现
//! 覆盖 OpenAI、DeepSeek 与本地 Ollama（/v1 接口）。模型在构造时绑定，
//! complete 与 generate 共用一条请求通路并累计 token 用量。

use std::sync::atomic::{AtomicU64, Ordering};

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{GenerateOptions, LlmClient, Message, Role};

/// 本地端点（Ollama 等）不校验 Key，但 SDK 要求非空
const PLACEHOLDER_KEY: &str = "sk-placeholder";

/// 累计 token 用量；客户端整体在 Arc 后共享，内部用原子量即可
#[derive(Debug, Default)]
pub struct TokenUsage {
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl TokenUsage {
    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    /// (prompt, completion, total)
    pub fn get(&self) -> (u64, u64, u64) {
        let prompt = self.prompt_tokens.load(Ordering::Relaxed);
        let completion = self.completion_tokens.load(Ordering::Relaxed);
        (prompt, completion, prompt + completion)
    }
}

/// 把对话转录转为 API 消息；每个角色走对应的 builder
fn to_api_message(message: &Message) -> ChatCompletionRequestMessage {
    let content = message.content.clone();
    match message.role {
        Role::System => ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()
                .unwrap(),
        ),
        Role::User => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()
                .unwrap(),
        ),
        Role::Assistant => ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(content)
                .build()
                .unwrap(),
        ),
    }
}

/// OpenAI 兼容客户端
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let key = match api_key {
            Some(k) => k.to_string(),
            None => std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| PLACEHOLDER_KEY.to_string()),
        };
        let mut config = OpenAIConfig::new().with_api_key(key);
        if let Some(url) = base_url {
            config = config.with_api_base(url);
        }
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            usage: TokenUsage::default(),
        }
    }

    /// 发送一次 chat 请求：取首条 choice 的 content，并累计用量
    async fn send_chat(&self, request: CreateChatCompletionRequest) -> Result<String, String> {
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| e.to_string())?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages.iter().map(to_api_message).collect::<Vec<_>>())
            .build()
            .map_err(|e| e.to_string())?;
        self.send_chat(request).await
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, String> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(vec![to_api_message(&Message::user(prompt))]);
        if let Some(t) = options.temperature {
            builder.temperature(t);
        }
        if let Some(cap) = options.max_tokens {
            builder.max_completion_tokens(cap);
        }
        let request = builder.build().map_err(|e| e.to_string())?;
        self.send_chat(request).await
    }
}
