//! Manager：规划与委派
//!
//! 收到请求后调用一次 LLM 产出 JSON 计划（action / target / instruction）。
//! DELEGATE 且目标在白名单内时沿用入站 context_id 向目标发送 Request，并把
//! 返回的结果包上目标标记；ANSWER 或目标无效时直接以 instruction 作答。
//! 计划解析失败返回固定文案，不上抛。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::society::actor::{Agent, AgentCore};
use crate::society::message::{AgentMessage, MessageKind};

pub const MANAGER_NAME: &str = "Manager";

/// 默认人设：指挥专家而非亲自执行
pub const DEFAULT_MANAGER_PERSONA: &str =
    "你是管理者。不要亲自执行任务，而是指挥专家完成：调查类工作交给 Researcher，撰写类工作交给 Writer。";

/// 计划解析失败时的固定回复
pub const PLAN_PARSE_FAILED: &str = "规划失败：无法从管理者的输出中解析出计划。";

/// 委派对象没有给出回复时的固定回复
pub const DELEGATION_NO_RESULT: &str = "委派未取得结果：目标智能体没有给出回复。";

/// ANSWER 计划中 instruction 为空时的固定回复
pub const EMPTY_ANSWER_FALLBACK: &str = "（未能生成有效回答）";

/// 计划 JSON 结构（仅用于 Schema 生成，注入规划 prompt）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct PlanFormat {
    /// "DELEGATE" 表示交给专家执行，"ANSWER" 表示自己直接作答
    pub action: String,
    /// 委派目标（如 Researcher、Writer）；ANSWER 时为 "None"
    pub target: String,
    /// DELEGATE 时下达给专家的指令；ANSWER 时即回复文本
    pub instruction: String,
}

fn plan_schema_json() -> String {
    let schema = schema_for!(PlanFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

/// 反序列化用的宽松结构：缺字段按空处理，与「无法解析」区分开
#[derive(Debug, Default, Deserialize)]
struct RawPlan {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    instruction: Option<String>,
}

/// 规范化后的管理者计划
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerPlan {
    pub action: String,
    pub target: String,
    pub instruction: String,
}

/// 从 LLM 输出中提取 JSON 块（```json 围栏或首个 { 到末个 }）
fn extract_json_block(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(
            rest.find("```")
                .map(|end| rest[..end].trim())
                .unwrap_or_else(|| rest.trim()),
        );
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&trimmed[start..=end])
}

/// 解析计划；返回 None 即「计划解析失败」
pub fn parse_plan(output: &str) -> Option<ManagerPlan> {
    let block = extract_json_block(output)?;
    let raw: RawPlan = serde_json::from_str(block).ok()?;
    Some(ManagerPlan {
        action: raw.action.unwrap_or_default(),
        target: raw.target.unwrap_or_else(|| "None".to_string()),
        instruction: raw.instruction.unwrap_or_default(),
    })
}

/// 管理者智能体
pub struct ManagerAgent {
    core: AgentCore,
    llm: Arc<dyn LlmClient>,
    delegates: Vec<String>,
}

impl ManagerAgent {
    pub fn new(llm: Arc<dyn LlmClient>, persona: impl Into<String>) -> Self {
        Self {
            core: AgentCore::new(MANAGER_NAME, persona),
            llm,
            delegates: vec!["Researcher".to_string(), "Writer".to_string()],
        }
    }

    pub fn with_delegates(mut self, delegates: Vec<String>) -> Self {
        self.delegates = delegates;
        self
    }

    async fn plan(&self, request: &str) -> Result<String, AgentError> {
        let system = format!(
            "{persona}\n\n\
             Decide how to handle the user's request. Respond with exactly one JSON object \
             matching this schema:\n{schema}\n\n\
             Rules:\n\
             - \"action\" is \"DELEGATE\" to hand the work to one specialist, or \"ANSWER\" to reply yourself.\n\
             - Valid targets: {targets}. Use \"None\" when answering yourself.\n\
             - For ANSWER, put the full reply text in \"instruction\".\n\
             Output only the JSON object.",
            persona = self.core.persona(),
            schema = plan_schema_json(),
            targets = self.delegates.join(", "),
        );
        let messages = [
            Message::system(system),
            Message::user(format!("Request: {}", request)),
        ];
        self.llm
            .complete(&messages)
            .await
            .map_err(AgentError::LlmError)
    }

    fn direct_answer(&self, instruction: String) -> String {
        if instruction.trim().is_empty() {
            EMPTY_ANSWER_FALLBACK.to_string()
        } else {
            instruction
        }
    }
}

#[async_trait]
impl Agent for ManagerAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn decide(&self, message: &AgentMessage) -> Result<Option<String>, AgentError> {
        // 同步返回值模式下委派结果经 send 的返回值回传，不会以 Response 消息
        // 进来；此分支保留给未来的队列式投递
        if message.kind == MessageKind::Response {
            return Ok(Some(message.content.clone()));
        }

        let output = self.plan(&message.content).await?;
        let Some(plan) = parse_plan(&output) else {
            tracing::warn!(raw = %output, "manager plan parse failed");
            return Ok(Some(PLAN_PARSE_FAILED.to_string()));
        };

        if plan.action == "DELEGATE" {
            if self.delegates.iter().any(|d| *d == plan.target) {
                tracing::info!(
                    target = %plan.target,
                    context_id = %message.context_id,
                    "manager delegating"
                );
                let reply = self
                    .core
                    .send(
                        &plan.target,
                        &plan.instruction,
                        MessageKind::Request,
                        Some(&message.context_id),
                    )
                    .await?;
                return Ok(Some(match reply {
                    Some(text) => format!("[{} result]\n\n{}", plan.target, text),
                    None => DELEGATION_NO_RESULT.to_string(),
                }));
            }
            tracing::warn!(target = %plan.target, "unknown delegation target, answering directly");
        }

        Ok(Some(self.direct_answer(plan.instruction)))
    }
}
