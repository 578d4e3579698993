//! 人设：助手身份的声明与系统提示词渲染
//!
//! 人设存放在 `config/persona.toml` 的 `[persona]` 表；文件缺失或解析失败
//! 时记录警告并退回内置默认，不阻塞启动。

use std::path::Path;

use serde::Deserialize;

use crate::memory::Memory;

/// 助手人设（persona.toml）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub name: String,
    pub description: String,
    pub tone: String,
    pub language: String,
    pub restrictions: Vec<String>,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "Hive".to_string(),
            description: "一个乐于助人的个人智能体，擅长聊天、查资料和处理工作区文件。".to_string(),
            tone: "友好、简洁".to_string(),
            language: "中文".to_string(),
            restrictions: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PersonaToml {
    persona: Persona,
}

/// 从 TOML 文件加载人设，任何失败都回退到默认
pub fn load_persona(path: impl AsRef<Path>) -> Persona {
    let path = path.as_ref();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "persona file missing, using default");
            return Persona::default();
        }
    };
    match toml::from_str::<PersonaToml>(&content) {
        Ok(file) => {
            tracing::info!(name = %file.persona.name, "persona loaded");
            file.persona
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "persona file malformed, using default");
            Persona::default()
        }
    }
}

/// 渲染系统提示词：人设描述 + 针对当前输入召回的相关记忆
pub fn build_system_prompt(
    persona: &Persona,
    memory: &dyn Memory,
    query: &str,
    recall_k: usize,
) -> String {
    let mut prompt = format!(
        "你是 {}。{}\n语气：{}。回复语言：{}。",
        persona.name, persona.description, persona.tone, persona.language
    );

    if !persona.restrictions.is_empty() {
        prompt.push_str("\n约束：");
        for r in &persona.restrictions {
            prompt.push_str(&format!("\n- {}", r));
        }
    }

    if memory.enabled() {
        let recalled = memory.recall(query, recall_k);
        if !recalled.is_empty() {
            prompt.push_str("\n\nRelevant Past Knowledge:");
            for entry in recalled {
                prompt.push_str(&format!("\n- {}", entry));
            }
        }
    }

    prompt
}
