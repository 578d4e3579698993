//! 迭代式工具推理循环
//!
//! Thought -> Action -> Observation 循环：每轮一次 LLM 补全，至多执行一个
//! 工具，观察以 user 轮写回转录；出现 Final Answer 即终止。迭代上限内未
//! 完成时返回固定文案（正常返回，不是错误）。LLM 调用失败原样上抛。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::memory::Memory;
use crate::react::parser::{extract_final_answer, parse_action};
use crate::tools::ToolExecutor;

/// 默认迭代上限，防止死循环
pub const DEFAULT_MAX_ITERATIONS: usize = 10;
/// Observation 日志预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 循环协议提示词；{tool_descriptions} 在运行时替换为已注册工具列表
const REACT_SYSTEM_PROMPT: &str = r#"You are an agent that completes the user's task by reasoning step by step and using tools.

Available tools:
{tool_descriptions}

Strictly follow this format:

Thought: [analyse the situation and decide what to do next]
Action: [name of one tool from the list]
Action Input: [tool input as a JSON object]
Observation: [tool result, provided by the system]
... (repeat Thought / Action / Observation as needed)
Final Answer: [the final reply for the user]

Never use a tool that is not listed.
Every Action Input must be a valid JSON object.
Once you write "Final Answer:", do not produce any further Action."#;

/// 模型没有给出可识别动作时插入的纠偏观察
const CORRECTIVE_OBSERVATION: &str = "Observation: Your last reply did not follow the protocol. \
Either provide an Action with an Action Input, or finish with \"Final Answer:\".";

/// 工具推理循环：持有 LLM、执行器与可选记忆
pub struct ReactLoop {
    llm: Arc<dyn LlmClient>,
    executor: Arc<ToolExecutor>,
    memory: Option<Arc<dyn Memory>>,
    max_iterations: usize,
}

impl ReactLoop {
    pub fn new(llm: Arc<dyn LlmClient>, executor: Arc<ToolExecutor>) -> Self {
        Self {
            llm,
            executor,
            memory: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// 附加记忆：成功完成任务时写入「任务 + 答案」条目
    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    fn system_prompt(&self, context: Option<&str>) -> String {
        let mut lines = self
            .executor
            .tool_descriptions()
            .into_iter()
            .map(|(name, desc)| format!("- {}: {}", name, desc))
            .collect::<Vec<_>>();
        lines.sort();
        let tool_block = if lines.is_empty() {
            "(no tools registered)".to_string()
        } else {
            lines.join("\n")
        };
        let protocol = REACT_SYSTEM_PROMPT.replace("{tool_descriptions}", &tool_block);
        match context {
            Some(c) if !c.trim().is_empty() => format!("{}\n\n{}", c, protocol),
            _ => protocol,
        }
    }

    /// 运行循环直至 Final Answer、迭代上限或 LLM 错误。
    /// context 为可选的外层系统上下文（人设、召回的记忆等）。
    pub async fn run(&self, task: &str, context: Option<&str>) -> Result<String, AgentError> {
        let mut messages = vec![
            Message::system(self.system_prompt(context)),
            Message::user(format!("Task: {}", task)),
        ];

        for iteration in 1..=self.max_iterations {
            tracing::debug!(iteration, max = self.max_iterations, "react iteration");

            let output = self
                .llm
                .complete(&messages)
                .await
                .map_err(AgentError::LlmError)?;
            messages.push(Message::assistant(output.clone()));

            if let Some(answer) = extract_final_answer(&output) {
                tracing::info!(iteration, "final answer reached");
                if let Some(memory) = &self.memory {
                    memory.save(
                        &format!("[Task] {}\n[Answer] {}", task, answer),
                        task_metadata(),
                    );
                }
                return Ok(answer);
            }

            match parse_action(&output) {
                Some((action, input)) => {
                    let observation = if self.executor.get_tool(&action).is_some() {
                        match self.executor.execute(&action, input).await {
                            Ok(result) => result,
                            // 工具失败作为观察反馈给模型，循环继续
                            Err(e) => format!("ERROR: {}", e),
                        }
                    } else {
                        let mut names = self.executor.tool_names();
                        names.sort();
                        format!(
                            "ERROR: tool '{}' not found. Available tools: {}",
                            action,
                            names.join(", ")
                        )
                    };
                    let preview: String =
                        observation.chars().take(OBSERVATION_PREVIEW_CHARS).collect();
                    tracing::debug!(tool = %action, preview = %preview, "observation");
                    messages.push(Message::user(format!("Observation: {}", observation)));
                }
                None => {
                    messages.push(Message::user(CORRECTIVE_OBSERVATION.to_string()));
                }
            }
        }

        tracing::warn!(max = self.max_iterations, "max iterations reached without final answer");
        Ok(format!(
            "已达到最大迭代次数（{}），未能完成任务。",
            self.max_iterations
        ))
    }
}

fn task_metadata() -> HashMap<String, String> {
    HashMap::from([
        ("type".to_string(), "task".to_string()),
        ("timestamp".to_string(), Utc::now().to_rfc3339()),
    ])
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::llm::mock::ScriptedLlmClient;
    use crate::memory::InMemoryStore;
    use crate::tools::{EchoTool, Tool, ToolRegistry};

    /// 记录调用次数的计数工具
    struct CountingTool {
        calls: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "counter"
        }

        fn description(&self) -> &str {
            "Counts invocations"
        }

        async fn execute(&self, args: Value) -> Result<String, String> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(args);
            Ok(format!("count={}", calls.len()))
        }
    }

    fn echo_executor() -> Arc<ToolExecutor> {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        Arc::new(ToolExecutor::new(registry))
    }

    #[tokio::test]
    async fn test_tool_then_final_answer() {
        let llm = Arc::new(ScriptedLlmClient::new([
            "Thought: echo it\nAction: echo\nAction Input: {\"text\": \"ping\"}",
            "Thought: done\nFinal Answer: the echo said ping",
        ]));
        let react = ReactLoop::new(llm.clone(), echo_executor());
        let answer = react.run("repeat ping", None).await.unwrap();
        assert_eq!(answer, "the echo said ping");

        // 第二轮应看到 Observation 作为 user 轮
        let calls = llm.complete_calls.lock().unwrap();
        let second_transcript = &calls[1];
        let last = second_transcript.last().unwrap();
        assert_eq!(last.content, "Observation: ping");
    }

    #[tokio::test]
    async fn test_final_answer_uses_last_marker_occurrence() {
        let llm = Arc::new(ScriptedLlmClient::new([
            "Final Answer: first try\nwait, revising\nFinal Answer: definitive",
        ]));
        let react = ReactLoop::new(llm, echo_executor());
        let answer = react.run("task", None).await.unwrap();
        assert_eq!(answer, "definitive");
    }

    #[tokio::test]
    async fn test_loop_halts_at_iteration_ceiling_with_sentinel() {
        // 永远既无动作也无终止标记
        let replies: Vec<String> = (0..3).map(|i| format!("musing {}", i)).collect();
        let llm = Arc::new(ScriptedLlmClient::new(replies));
        let react = ReactLoop::new(llm.clone(), echo_executor()).with_max_iterations(3);
        let answer = react.run("task", None).await.unwrap();
        assert!(answer.contains("最大迭代次数"));
        assert_eq!(llm.complete_calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_at_most_one_tool_invocation_per_iteration() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new();
        registry.register(CountingTool { calls: calls.clone() });
        let executor = Arc::new(ToolExecutor::new(registry));

        let llm = Arc::new(ScriptedLlmClient::new([
            // 一条输出里写了两个 Action，只应执行第一个
            "Action: counter\nAction Input: {\"n\": 1}\nAction: counter\nAction Input: {\"n\": 2}",
            "Final Answer: done",
        ]));
        let react = ReactLoop::new(llm, executor);
        react.run("count", None).await.unwrap();

        let recorded = calls.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0]["n"], 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_observation_lists_available_and_loop_recovers() {
        let llm = Arc::new(ScriptedLlmClient::new([
            "Action: fetch\nAction Input: {\"x\": 1}",
            "Final Answer: fell back without the tool",
        ]));
        let react = ReactLoop::new(llm.clone(), echo_executor());
        let answer = react.run("task", None).await.unwrap();
        assert_eq!(answer, "fell back without the tool");

        let calls = llm.complete_calls.lock().unwrap();
        let observation = &calls[1].last().unwrap().content;
        assert!(observation.contains("'fetch' not found"));
        assert!(observation.contains("echo"));
    }

    #[tokio::test]
    async fn test_corrective_turn_then_final_answer() {
        let llm = Arc::new(ScriptedLlmClient::new([
            "The answer is 42.",
            "Final Answer: 42",
        ]));
        let react = ReactLoop::new(llm.clone(), echo_executor());
        let answer = react.run("ultimate question", None).await.unwrap();
        assert_eq!(answer, "42");
        assert_eq!(llm.complete_calls.lock().unwrap().len(), 2);

        let calls = llm.complete_calls.lock().unwrap();
        let corrective = &calls[1].last().unwrap().content;
        assert!(corrective.contains("did not follow the protocol"));
    }

    #[tokio::test]
    async fn test_failing_tool_becomes_error_observation_and_loop_continues() {
        struct FailTool;

        #[async_trait]
        impl Tool for FailTool {
            fn name(&self) -> &str {
                "flaky"
            }

            fn description(&self) -> &str {
                "Always fails"
            }

            async fn execute(&self, _args: Value) -> Result<String, String> {
                Err("backend unavailable".to_string())
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(FailTool);
        let llm = Arc::new(ScriptedLlmClient::new([
            "Action: flaky\nAction Input: {}",
            "Final Answer: reported the failure",
        ]));
        let react = ReactLoop::new(llm.clone(), Arc::new(ToolExecutor::new(registry)));
        let answer = react.run("try flaky", None).await.unwrap();
        assert_eq!(answer, "reported the failure");

        let calls = llm.complete_calls.lock().unwrap();
        let observation = &calls[1].last().unwrap().content;
        assert!(observation.contains("ERROR:"));
        assert!(observation.contains("backend unavailable"));
    }

    #[tokio::test]
    async fn test_llm_failure_propagates_out_of_the_loop() {
        let llm = Arc::new(ScriptedLlmClient::new(Vec::<String>::new()));
        let react = ReactLoop::new(llm, echo_executor());
        let err = react.run("task", None).await.unwrap_err();
        assert!(matches!(err, AgentError::LlmError(_)));
    }

    #[tokio::test]
    async fn test_successful_task_is_saved_to_memory() {
        let memory = Arc::new(InMemoryStore::new(10));
        let llm = Arc::new(ScriptedLlmClient::new(["Final Answer: saved result"]));
        let react = ReactLoop::new(llm, echo_executor()).with_memory(memory.clone());
        react.run("remember this task", None).await.unwrap();

        let hits = memory.recall("remember this task", 3);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].starts_with("[Task]"));
        assert!(hits[0].contains("saved result"));
    }

    #[tokio::test]
    async fn test_context_prepends_to_system_prompt() {
        let llm = Arc::new(ScriptedLlmClient::new(["Final Answer: ok"]));
        let react = ReactLoop::new(llm.clone(), echo_executor());
        react.run("task", Some("你是测试人设")).await.unwrap();

        let calls = llm.complete_calls.lock().unwrap();
        let system = &calls[0][0].content;
        assert!(system.starts_with("你是测试人设"));
        assert!(system.contains("Available tools:"));
        assert!(system.contains("- echo:"));
    }
}
