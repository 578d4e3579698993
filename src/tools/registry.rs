//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），
//! 由 ToolRegistry 按名注册与查找；调用统一走 ToolExecutor。注册表按注册
//! 顺序保存工具，名称列表与描述列表的顺序到处一致。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// 工具接口。实现方提供名称与描述，execute 接收 JSON 参数对象
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（Action / TOOL 指令中引用的名字）
    fn name(&self) -> &str;

    /// 一句话描述，注入提示词帮助 LLM 选择工具
    fn description(&self) -> &str;

    /// 参数 JSON Schema。required 的首个属性会被当作单参数调用时的键。
    /// 缺省给出空 schema，适用于无参数或参数自由的工具
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具
    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 工具注册表：注册顺序即列举顺序，工具数量小，查找走线性扫描
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名后注册者替换先注册者（内建名的保护在插件装配层做）
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(i) => self.tools[i] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// (name, description) 列表，用于生成 prompt 中的 Available tools 段落
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.tools
            .iter()
            .map(|t| (t.name().to_string(), t.description().to_string()))
            .collect()
    }
}
