//! 应用配置：TOML 文件与 HIVE_ 环境变量分层加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 配置树的根，字段与 TOML 顶层 section 一一对应
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub memory: MemorySection,
    #[serde(default)]
    pub society: SocietySection,
    #[serde(default)]
    pub react: ReactSection,
}

/// [app] 段：应用名、工作目录、人设文件
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 文件工具的沙箱根目录；缺省为 ./workspace
    pub workspace_root: Option<PathBuf>,
    /// 人设文件路径，未设置时用 config/persona.toml
    pub persona_path: Option<PathBuf>,
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：ollama / openai / deepseek / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub openai: LlmOpenAiSection,
    #[serde(default)]
    pub deepseek: LlmDeepSeekSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            openai: LlmOpenAiSection::default(),
            deepseek: LlmDeepSeekSection::default(),
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

/// [tools] 段：网页抓取、插件清单
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default)]
    pub web: WebSection,
    /// 插件子进程守护超时（秒），属于插件体自身而非编排内核
    #[serde(default = "default_plugin_timeout_secs")]
    pub plugin_timeout_secs: u64,
    /// [[tools.plugins]] 清单
    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            web: WebSection::default(),
            plugin_timeout_secs: default_plugin_timeout_secs(),
            plugins: Vec::new(),
        }
    }
}

fn default_plugin_timeout_secs() -> u64 {
    30
}

/// [tools.web] 段：抓取 URL 的超时、最大字符数、允许的域名白名单
#[derive(Debug, Clone, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_web_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_web_timeout_secs(),
            max_result_chars: default_max_result_chars(),
            allowed_domains: default_allowed_domains(),
        }
    }
}

fn default_web_timeout_secs() -> u64 {
    15
}

fn default_max_result_chars() -> usize {
    8000
}

fn default_allowed_domains() -> Vec<String> {
    vec![
        // 百科与文档
        "en.wikipedia.org".into(),
        "zh.wikipedia.org".into(),
        "baike.baidu.com".into(),
        "developer.mozilla.org".into(),
        "doc.rust-lang.org".into(),
        "docs.rs".into(),
        // 代码与问答
        "github.com".into(),
        "raw.githubusercontent.com".into(),
        "crates.io".into(),
        "stackoverflow.com".into(),
        "www.zhihu.com".into(),
        // 资讯与论文
        "news.ycombinator.com".into(),
        "arxiv.org".into(),
    ]
}

/// [[tools.plugins]] 条目：外部程序作为工具暴露给循环
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PluginEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub program: String,
    /// 参数模板，支持 {{workspace}} 与 {{key}} 占位符
    #[serde(default)]
    pub args: Vec<String>,
}

/// [memory] 段：条目上限、召回数量
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySection {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_recall_k")]
    pub recall_k: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            recall_k: default_recall_k(),
        }
    }
}

fn default_max_entries() -> usize {
    1000
}

fn default_recall_k() -> usize {
    5
}

/// [society] 段：三个内置智能体的人设覆盖（未设置时用内置默认）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SocietySection {
    pub manager_persona: Option<String>,
    pub researcher_persona: Option<String>,
    pub writer_persona: Option<String>,
}

/// [react] 段：循环迭代上限
#[derive(Debug, Clone, Deserialize)]
pub struct ReactSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for ReactSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            tools: ToolsSection::default(),
            memory: MemorySection::default(),
            society: SocietySection::default(),
            react: ReactSection::default(),
        }
    }
}

/// 加载配置：默认配置文件、显式指定文件、环境变量三层叠加，后者覆盖前者。
/// 环境变量前缀 HIVE，双下划线表示嵌套键（如 HIVE__LLM__PROVIDER）。
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    // 默认配置：取候选位置中第一个存在的文件
    let found = ["config/default", "../config/default", "default"]
        .into_iter()
        .find(|name| std::path::Path::new(&format!("{}.toml", name)).exists());
    if let Some(name) = found {
        builder = builder.add_source(config::File::with_name(name).required(false));
    }

    if let Some(path) = config_path.filter(|p| p.exists()) {
        builder = builder.add_source(config::File::from(path));
    }

    builder
        .add_source(
            config::Environment::with_prefix("HIVE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
