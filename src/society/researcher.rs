//! Researcher：两段式调查
//!
//! 第一段让 LLM 给出 TOOL / INPUT 两行指令（或直接作答）；第二段把工具输出
//! 作为素材做综合。工具失败不上抛，失败文本带 ERROR: 前缀作为观察进入第二
//! 段。观察超过字符预算时截断。Researcher 自己从不向别的智能体发消息。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::society::actor::{Agent, AgentCore};
use crate::society::message::AgentMessage;
use crate::tools::ToolExecutor;

pub const RESEARCHER_NAME: &str = "Researcher";

pub const DEFAULT_RESEARCHER_PERSONA: &str =
    "你是严谨的调查专家。基于事实收集信息，给出可核查的来源。";

/// 进入综合阶段的观察文本上限（字符数）
const OBSERVATION_MAX_CHARS: usize = 4000;

/// 逐行扫描 TOOL: / INPUT: 指令；INPUT 必须出现在 TOOL 之后。
/// 找不到完整指令返回 None，第一段文本即最终回答。
pub fn parse_tool_directive(text: &str) -> Option<(String, String)> {
    let mut tool: Option<String> = None;
    for line in text.lines() {
        let line = line.trim();
        if tool.is_none() {
            if let Some(rest) = line.strip_prefix("TOOL:") {
                let name = rest.trim();
                if !name.is_empty() {
                    tool = Some(name.to_string());
                }
            }
        } else if let Some(rest) = line.strip_prefix("INPUT:") {
            return tool.map(|t| (t, rest.trim().to_string()));
        }
    }
    None
}

/// 从工具参数 schema 推导单参数键：优先 required 首项，其次 properties 首
/// 项，兜底 "input"
fn primary_arg_key(executor: &ToolExecutor, tool: &str) -> String {
    executor
        .get_tool(tool)
        .map(|t| t.parameters_schema())
        .and_then(|schema| {
            schema
                .get("required")
                .and_then(|r| r.as_array())
                .and_then(|arr| arr.first())
                .and_then(|v| v.as_str())
                .map(String::from)
                .or_else(|| {
                    schema
                        .get("properties")
                        .and_then(|p| p.as_object())
                        .and_then(|o| o.keys().next())
                        .cloned()
                })
        })
        .unwrap_or_else(|| "input".to_string())
}

fn truncate_observation(observation: &str) -> String {
    if observation.chars().count() > OBSERVATION_MAX_CHARS {
        observation
            .chars()
            .take(OBSERVATION_MAX_CHARS)
            .collect::<String>()
            + "\n...[truncated]"
    } else {
        observation.to_string()
    }
}

/// 调查专家智能体
pub struct ResearcherAgent {
    core: AgentCore,
    llm: Arc<dyn LlmClient>,
}

impl ResearcherAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        persona: impl Into<String>,
        tools: Arc<ToolExecutor>,
    ) -> Self {
        Self {
            core: AgentCore::new(RESEARCHER_NAME, persona).with_tools(tools),
            llm,
        }
    }

    fn plan_system_prompt(&self) -> String {
        let tool_lines = match self.core.tools() {
            Some(executor) => {
                let mut lines = executor
                    .tool_descriptions()
                    .into_iter()
                    .map(|(name, desc)| format!("- {}: {}", name, desc))
                    .collect::<Vec<_>>();
                lines.sort();
                lines.join("\n")
            }
            None => "(none)".to_string(),
        };
        format!(
            "{persona}\n\n\
             Available tools:\n{tool_lines}\n\n\
             If exactly one tool call would help you fulfil the request, reply with two lines:\n\
             TOOL: <tool name>\n\
             INPUT: <the single input value, such as a URL or a file path>\n\n\
             If no tool is needed, answer the request directly from what you know.",
            persona = self.core.persona(),
            tool_lines = tool_lines,
        )
    }

    async fn run_directive(&self, tool: &str, input: &str) -> String {
        let Some(executor) = self.core.tools() else {
            return "ERROR: no tool executor attached".to_string();
        };
        let key = primary_arg_key(executor, tool);
        let args = serde_json::json!({ key: input });
        match executor.execute(tool, args).await {
            Ok(output) => output,
            // 工具失败作为观察继续，不中断调查
            Err(e) => format!("ERROR: {}", e),
        }
    }
}

#[async_trait]
impl Agent for ResearcherAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn decide(&self, message: &AgentMessage) -> Result<Option<String>, AgentError> {
        let plan_messages = [
            Message::system(self.plan_system_prompt()),
            Message::user(message.content.clone()),
        ];
        let plan = self
            .llm
            .complete(&plan_messages)
            .await
            .map_err(AgentError::LlmError)?;

        let Some((tool, input)) = parse_tool_directive(&plan) else {
            return Ok(Some(plan));
        };

        tracing::info!(tool = %tool, context_id = %message.context_id, "researcher tool directive");
        let observation = self.run_directive(&tool, &input).await;
        let observation = truncate_observation(&observation);

        let synthesis_prompt = format!(
            "Request: {request}\n\n\
             Tool `{tool}` returned:\n{observation}\n\n\
             Using only the material above, write a fact-grounded answer to the request. \
             Mention the source when the material came from a URL.",
            request = message.content,
        );
        let synthesis_messages = [
            Message::system(self.core.persona().to_string()),
            Message::user(synthesis_prompt),
        ];
        let answer = self
            .llm
            .complete(&synthesis_messages)
            .await
            .map_err(AgentError::LlmError)?;
        Ok(Some(answer))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::llm::mock::ScriptedLlmClient;
    use crate::tools::{EchoTool, Tool, ToolRegistry};

    /// 永远失败的工具
    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            Err("disk on fire".to_string())
        }
    }

    fn executor() -> Arc<ToolExecutor> {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(BrokenTool);
        Arc::new(ToolExecutor::new(registry))
    }

    #[test]
    fn test_directive_parsing_rules() {
        assert_eq!(
            parse_tool_directive("TOOL: echo\nINPUT: hello"),
            Some(("echo".to_string(), "hello".to_string()))
        );
        // INPUT 可以不紧邻 TOOL，但必须在其后
        assert_eq!(
            parse_tool_directive("thinking...\nTOOL: web_scrape\n\nINPUT: https://a.b/c"),
            Some(("web_scrape".to_string(), "https://a.b/c".to_string()))
        );
        assert!(parse_tool_directive("INPUT: x\nTOOL: echo").is_none());
        assert!(parse_tool_directive("TOOL: echo\nno input line").is_none());
        assert!(parse_tool_directive("I will just answer directly.").is_none());
    }

    #[tokio::test]
    async fn test_no_directive_returns_phase_one_text() {
        let llm = Arc::new(ScriptedLlmClient::new(["巴黎是法国的首都。"]));
        let agent = ResearcherAgent::new(llm.clone(), DEFAULT_RESEARCHER_PERSONA, executor());
        let msg = AgentMessage::request("Manager", RESEARCHER_NAME, "法国的首都是哪里");
        let reply = agent.decide(&msg).await.unwrap().unwrap();
        assert_eq!(reply, "巴黎是法国的首都。");
        // 只消费了第一段调用
        assert_eq!(llm.complete_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_directive_runs_tool_and_feeds_synthesis() {
        let llm = Arc::new(ScriptedLlmClient::new([
            "TOOL: echo\nINPUT: fresh data point",
            "综合结论：fresh data point。",
        ]));
        let agent = ResearcherAgent::new(llm.clone(), DEFAULT_RESEARCHER_PERSONA, executor());
        let msg = AgentMessage::request("Manager", RESEARCHER_NAME, "收集素材");
        let reply = agent.decide(&msg).await.unwrap().unwrap();
        assert_eq!(reply, "综合结论：fresh data point。");

        let calls = llm.complete_calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        // 第二段 user 消息应携带工具输出
        let synthesis_user = &calls[1].last().unwrap().content;
        assert!(synthesis_user.contains("fresh data point"));
        assert!(synthesis_user.contains("`echo`"));
    }

    #[tokio::test]
    async fn test_failing_tool_becomes_error_observation() {
        let llm = Arc::new(ScriptedLlmClient::new([
            "TOOL: broken\nINPUT: anything",
            "工具坏了，我只能汇报失败。",
        ]));
        let agent = ResearcherAgent::new(llm.clone(), DEFAULT_RESEARCHER_PERSONA, executor());
        let msg = AgentMessage::request("Manager", RESEARCHER_NAME, "查询");
        let reply = agent.decide(&msg).await.unwrap().unwrap();
        assert_eq!(reply, "工具坏了，我只能汇报失败。");

        let calls = llm.complete_calls.lock().unwrap();
        let synthesis_user = &calls[1].last().unwrap().content;
        assert!(synthesis_user.contains("ERROR:"));
        assert!(synthesis_user.contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_unknown_tool_in_directive_is_caught_as_observation() {
        let llm = Arc::new(ScriptedLlmClient::new([
            "TOOL: crystal_ball\nINPUT: the future",
            "没有这个工具。",
        ]));
        let agent = ResearcherAgent::new(llm.clone(), DEFAULT_RESEARCHER_PERSONA, executor());
        let msg = AgentMessage::request("Manager", RESEARCHER_NAME, "预测未来");
        let reply = agent.decide(&msg).await.unwrap().unwrap();
        assert_eq!(reply, "没有这个工具。");

        let calls = llm.complete_calls.lock().unwrap();
        let synthesis_user = &calls[1].last().unwrap().content;
        assert!(synthesis_user.contains("ERROR: Unknown tool: crystal_ball"));
    }

    #[test]
    fn test_long_observations_are_truncated_with_marker() {
        let long = "x".repeat(OBSERVATION_MAX_CHARS + 50);
        let truncated = truncate_observation(&long);
        assert!(truncated.ends_with("...[truncated]"));
        assert!(truncated.chars().count() < long.chars().count());
        let short = truncate_observation("short");
        assert_eq!(short, "short");
    }
}
