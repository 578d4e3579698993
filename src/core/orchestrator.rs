//! 编排器：装配与按意图分发
//!
//! 负责：根据配置创建 LLM/工具/记忆/人设，注册智能体社会（重名即启动
//! 失败），并把每条用户输入按意图送往聊天、推理循环或社会。LLM 调用失败
//! 从这里原样上抛，由交互层决定如何呈现。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::{LlmClient, Message, MockLlmClient, OpenAiClient};
use crate::memory::{InMemoryStore, Memory};
use crate::persona::{build_system_prompt, load_persona, Persona};
use crate::react::ReactLoop;
use crate::router::{Intent, IntentRouter};
use crate::society::{
    AgentMessage, AgentRegistry, ManagerAgent, ResearcherAgent, WriterAgent,
    DEFAULT_MANAGER_PERSONA, DEFAULT_RESEARCHER_PERSONA, DEFAULT_WRITER_PERSONA, MANAGER_NAME,
};
use crate::tools::{
    build_plugin_tools, EchoTool, ListDirTool, ReadFileTool, ToolExecutor, ToolRegistry,
    WebScrapeTool, WriteFileTool,
};

/// 社会调度没有产出回复时给用户的固定文案
pub const SOCIETY_NO_REPLY: &str = "智能体社会没有给出回复。";

/// Persona 意图的占位回复（人设调整未接入交互层）
const PERSONA_NOT_WIRED: &str =
    "人设功能尚未接通：当前版本使用 config/persona.toml 中的固定人设。";

/// Schedule 意图的占位回复（定时任务未接入交互层）
const SCHEDULE_NOT_WIRED: &str = "定时任务功能尚未接通：请直接告诉我现在要做什么。";

/// 写入记忆的社会结果摘要长度
const SOCIETY_RESULT_PREVIEW_CHARS: usize = 300;

/// 根据配置与环境变量选择 LLM 后端（Ollama / OpenAI / DeepSeek / Mock）
pub(crate) fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    match provider.as_str() {
        // Ollama 走 OpenAI 兼容端点，无需真实 Key
        "ollama" => {
            let base = cfg
                .llm
                .base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434/v1".to_string());
            tracing::info!("Using Ollama LLM ({}) at {}", cfg.llm.model, base);
            Arc::new(OpenAiClient::new(
                Some(&base),
                &cfg.llm.model,
                Some("ollama"),
            ))
        }
        "openai" => match std::env::var("OPENAI_API_KEY") {
            Ok(key) => {
                let model = cfg
                    .llm
                    .openai
                    .model
                    .clone()
                    .unwrap_or_else(|| "gpt-4o-mini".to_string());
                tracing::info!("Using OpenAI LLM ({})", model);
                Arc::new(OpenAiClient::new(
                    cfg.llm.base_url.as_deref(),
                    &model,
                    Some(&key),
                ))
            }
            Err(_) => {
                tracing::warn!("OPENAI_API_KEY not set, using Mock LLM");
                Arc::new(MockLlmClient)
            }
        },
        "deepseek" => match std::env::var("DEEPSEEK_API_KEY") {
            Ok(key) => {
                let model = cfg
                    .llm
                    .deepseek
                    .model
                    .clone()
                    .unwrap_or_else(|| "deepseek-chat".to_string());
                tracing::info!("Using DeepSeek LLM ({})", model);
                Arc::new(OpenAiClient::new(
                    Some("https://api.deepseek.com/v1"),
                    &model,
                    Some(&key),
                ))
            }
            Err(_) => {
                tracing::warn!("DEEPSEEK_API_KEY not set, using Mock LLM");
                Arc::new(MockLlmClient)
            }
        },
        "mock" => Arc::new(MockLlmClient),
        other => {
            tracing::warn!(provider = %other, "Unknown LLM provider, using Mock LLM");
            Arc::new(MockLlmClient)
        }
    }
}

/// 编排器：持有一次会话所需的全部组件
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    router: IntentRouter,
    react: ReactLoop,
    registry: AgentRegistry,
    memory: Arc<dyn Memory>,
    persona: Persona,
    recall_k: usize,
}

impl Orchestrator {
    /// 按配置装配；LLM 后端由 provider 与环境变量决定
    pub fn new(cfg: &AppConfig) -> Result<Self, AgentError> {
        let llm = create_llm_from_config(cfg);
        Self::with_client(cfg, llm)
    }

    /// 用外部传入的 LLM 装配其余组件
    pub fn with_client(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> Result<Self, AgentError> {
        // 沙箱目录取自配置，缺省落在 ./workspace
        let workspace = cfg
            .app
            .workspace_root
            .clone()
            .unwrap_or_else(|| std::path::PathBuf::from("workspace"));
        std::fs::create_dir_all(&workspace).map_err(|e| {
            AgentError::ConfigError(format!(
                "cannot create workspace {}: {}",
                workspace.display(),
                e
            ))
        })?;
        let workspace = workspace
            .canonicalize()
            .unwrap_or_else(|_| workspace.clone());

        let mut tools = ToolRegistry::new();
        tools.register(EchoTool);
        tools.register(ReadFileTool::new(&workspace));
        tools.register(WriteFileTool::new(&workspace));
        tools.register(ListDirTool::new(&workspace));
        tools.register(WebScrapeTool::new(
            cfg.tools.web.allowed_domains.clone(),
            cfg.tools.web.timeout_secs,
            cfg.tools.web.max_result_chars,
        ));
        let reserved = tools.tool_names();
        for plugin in build_plugin_tools(
            &cfg.tools.plugins,
            &workspace,
            cfg.tools.plugin_timeout_secs,
            &reserved,
        ) {
            tools.register(plugin);
        }
        let executor = Arc::new(ToolExecutor::new(tools));

        let memory: Arc<dyn Memory> = Arc::new(InMemoryStore::new(cfg.memory.max_entries));

        let persona_path = cfg
            .app
            .persona_path
            .clone()
            .or_else(|| {
                ["config/persona.toml", "../config/persona.toml"]
                    .into_iter()
                    .map(std::path::PathBuf::from)
                    .find(|p| p.exists())
            })
            .unwrap_or_else(|| std::path::PathBuf::from("config/persona.toml"));
        let persona = load_persona(&persona_path);

        // 社会：三个内置成员，重名注册是启动期致命错误
        let registry = AgentRegistry::new();
        let manager_persona = cfg
            .society
            .manager_persona
            .clone()
            .unwrap_or_else(|| DEFAULT_MANAGER_PERSONA.to_string());
        let researcher_persona = cfg
            .society
            .researcher_persona
            .clone()
            .unwrap_or_else(|| DEFAULT_RESEARCHER_PERSONA.to_string());
        let writer_persona = cfg
            .society
            .writer_persona
            .clone()
            .unwrap_or_else(|| DEFAULT_WRITER_PERSONA.to_string());
        registry.register(Arc::new(ManagerAgent::new(llm.clone(), manager_persona)))?;
        registry.register(Arc::new(ResearcherAgent::new(
            llm.clone(),
            researcher_persona,
            executor.clone(),
        )))?;
        registry.register(Arc::new(WriterAgent::new(llm.clone(), writer_persona)))?;

        let react = ReactLoop::new(llm.clone(), executor)
            .with_memory(memory.clone())
            .with_max_iterations(cfg.react.max_iterations);
        let router = IntentRouter::new(llm.clone());

        Ok(Self {
            llm,
            router,
            react,
            registry,
            memory,
            persona,
            recall_k: cfg.memory.recall_k,
        })
    }

    pub fn memory(&self) -> Arc<dyn Memory> {
        self.memory.clone()
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 处理一条用户输入：分类意图并走相应管线，返回最终回复
    pub async fn handle(&self, input: &str) -> Result<String, AgentError> {
        let intent = self.router.classify(input).await;
        tracing::info!(intent = intent.label(), "handling input");

        match intent {
            Intent::Chat => self.handle_chat(input).await,
            Intent::File | Intent::Web | Intent::Task => {
                let context = build_system_prompt(
                    &self.persona,
                    self.memory.as_ref(),
                    input,
                    self.recall_k,
                );
                self.react.run(input, Some(&context)).await
            }
            Intent::Society => self.handle_society(input).await,
            Intent::Persona => Ok(PERSONA_NOT_WIRED.to_string()),
            Intent::Schedule => Ok(SCHEDULE_NOT_WIRED.to_string()),
        }
    }

    async fn handle_chat(&self, input: &str) -> Result<String, AgentError> {
        let system = build_system_prompt(&self.persona, self.memory.as_ref(), input, self.recall_k);
        let messages = vec![Message::system(system), Message::user(input)];
        let answer = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::LlmError)?;
        self.memory.save(
            &format!("[Chat] User: {}\nAgent: {}", input, answer),
            timestamped_metadata("chat"),
        );
        Ok(answer)
    }

    /// 以 User 名义向 Manager 发起请求；整条委派链在这一次 await 内完成
    async fn handle_society(&self, input: &str) -> Result<String, AgentError> {
        let message = AgentMessage::request("User", MANAGER_NAME, input);
        let reply = self.registry.dispatch(message).await?;
        let result = reply.unwrap_or_else(|| SOCIETY_NO_REPLY.to_string());
        let preview: String = result.chars().take(SOCIETY_RESULT_PREVIEW_CHARS).collect();
        self.memory.save(
            &format!("[Society] User: {}\nResult: {}", input, preview),
            timestamped_metadata("society"),
        );
        Ok(result)
    }
}

fn timestamped_metadata(kind: &str) -> HashMap<String, String> {
    HashMap::from([
        ("type".to_string(), kind.to_string()),
        ("timestamp".to_string(), Utc::now().to_rfc3339()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::llm::mock::ScriptedLlmClient;

    fn test_config() -> (AppConfig, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = AppConfig::default();
        cfg.app.workspace_root = Some(dir.path().to_path_buf());
        (cfg, dir)
    }

    #[tokio::test]
    async fn test_chat_intent_answers_and_saves_memory() {
        // 第一条脚本喂给意图分类，第二条是聊天补全
        let llm = Arc::new(ScriptedLlmClient::new(["CHAT", "你好，有什么可以帮你？"]));
        let (cfg, _dir) = test_config();
        let orchestrator = Orchestrator::with_client(&cfg, llm).unwrap();

        let reply = orchestrator.handle("你好").await.unwrap();
        assert_eq!(reply, "你好，有什么可以帮你？");

        let recalled = orchestrator.memory().recall("你好", 3);
        assert_eq!(recalled.len(), 1);
        assert!(recalled[0].starts_with("[Chat]"));
    }

    #[tokio::test]
    async fn test_persona_and_schedule_intents_skip_the_llm() {
        // 每条输入只消耗一次分类调用，占位回复不再走 LLM
        let llm = Arc::new(ScriptedLlmClient::new(["PERSONA", "SCHEDULE"]));
        let (cfg, _dir) = test_config();
        let orchestrator = Orchestrator::with_client(&cfg, llm.clone()).unwrap();

        let reply = orchestrator.handle("换个人设").await.unwrap();
        assert!(reply.contains("人设"));
        let reply = orchestrator.handle("明早提醒我").await.unwrap();
        assert!(reply.contains("定时任务"));

        assert_eq!(llm.generate_calls.lock().unwrap().len(), 2);
        assert!(llm.complete_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_llm_failure_propagates() {
        // 分类成功后聊天补全脚本耗尽
        let llm = Arc::new(ScriptedLlmClient::new(["CHAT"]));
        let (cfg, _dir) = test_config();
        let orchestrator = Orchestrator::with_client(&cfg, llm).unwrap();
        let err = orchestrator.handle("聊聊").await.unwrap_err();
        assert!(matches!(err, AgentError::LlmError(_)));
    }
}
