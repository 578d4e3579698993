//! 工具箱：echo、沙箱文件、网页抓取、插件与执行器

pub mod echo;
pub mod executor;
pub mod filesystem;
pub mod plugin;
pub mod registry;
pub mod web;

pub use echo::EchoTool;
pub use executor::ToolExecutor;
pub use filesystem::{ListDirTool, ReadFileTool, SafeFs, WriteFileTool};
pub use plugin::{build_plugin_tools, PluginTool};
pub use registry::{Tool, ToolRegistry};
pub use web::WebScrapeTool;
