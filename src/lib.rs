//! Hive - Rust 多智能体编排层
//!
//! 模块划分：
//! - **config**: 分层配置（TOML 文件叠加环境变量）
//! - **core**: 错误类型与主编排器（意图分发、组件装配）
//! - **llm**: LlmClient trait 及 OpenAI 兼容 / Mock 后端
//! - **memory**: 关键词召回的会话记忆
//! - **persona**: 人设加载与系统提示词渲染
//! - **react**: 输出解析器与有界工具推理循环
//! - **router**: 意图路由（一次轻量 LLM 分类调用）
//! - **society**: 智能体社会（消息信封、注册表、Manager / Researcher / Writer）
//! - **tools**: 工具箱（echo、文件、网页抓取、插件）与执行器

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod persona;
pub mod react;
pub mod router;
pub mod society;
pub mod tools;
