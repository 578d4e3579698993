//! 意图路由：一次轻量 LLM 调用把用户输入归入七类意图
//!
//! 分类调用使用 temperature 0 与极小的 token 上限，输出按大写包含匹配；
//! 无法识别或调用失败时回退到 Chat，路由层自身从不返回错误。

use std::sync::Arc;

use crate::llm::{GenerateOptions, LlmClient};

/// 分类提示词；{user_input} 在运行时替换
const CLASSIFIER_PROMPT: &str = r#"Classify the user input into exactly one of these intents:

- CHAT: casual conversation, greetings, general questions
- FILE: reading, writing or listing files in the workspace
- WEB: fetching or summarizing content from the internet
- TASK: multi-step work that needs planning and tools
- PERSONA: viewing or changing the assistant's persona
- SCHEDULE: reminders, timers or recurring jobs
- SOCIETY: work that should be delegated to the agent team

Reply with the single intent label in uppercase and nothing else.

User input: {user_input}"#;

/// 分类输出的 token 上限；标签都是单词，留少量余量
const CLASSIFY_MAX_TOKENS: u32 = 10;

/// 用户输入的七类意图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// 闲聊/一般问答
    Chat,
    /// 工作区文件操作
    File,
    /// 网页抓取与摘要
    Web,
    /// 多步工具任务
    Task,
    /// 人设查看/调整
    Persona,
    /// 定时/提醒
    Schedule,
    /// 委派给智能体社会
    Society,
}

impl Intent {
    /// 大写标签，与分类提示词中的拼写一致
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Chat => "CHAT",
            Intent::File => "FILE",
            Intent::Web => "WEB",
            Intent::Task => "TASK",
            Intent::Persona => "PERSONA",
            Intent::Schedule => "SCHEDULE",
            Intent::Society => "SOCIETY",
        }
    }

    /// 匹配顺序固定，结果与模型输出的其余文字无关
    pub const ALL: [Intent; 7] = [
        Intent::Chat,
        Intent::File,
        Intent::Web,
        Intent::Task,
        Intent::Persona,
        Intent::Schedule,
        Intent::Society,
    ];
}

/// 意图路由器：持有 LLM，classify(input) 返回意图
pub struct IntentRouter {
    llm: Arc<dyn LlmClient>,
}

impl IntentRouter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 对用户输入做一次分类。任何失败都落到 Chat，调用方无需处理错误。
    pub async fn classify(&self, input: &str) -> Intent {
        let prompt = CLASSIFIER_PROMPT.replace("{user_input}", input);
        let options = GenerateOptions {
            temperature: Some(0.0),
            max_tokens: Some(CLASSIFY_MAX_TOKENS),
        };

        let raw = match self.llm.generate(&prompt, &options).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "intent classification failed, defaulting to chat");
                return Intent::Chat;
            }
        };

        let upper = raw.trim().to_uppercase();
        for intent in Intent::ALL {
            if upper.contains(intent.label()) {
                tracing::debug!(intent = intent.label(), "routed");
                return intent;
            }
        }

        tracing::debug!(raw = %raw, "no intent label recognized, defaulting to chat");
        Intent::Chat
    }
}
