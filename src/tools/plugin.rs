//! 插件工具：由配置 [[tools.plugins]] 清单注册，运行「程序 + 参数模板」实现扩展
//!
//! 参数模板中 {{workspace}} 替换为沙箱根路径，{{key}} 从 LLM 传入的 args 中
//! 取 key；执行时无 shell，直接 exec program + substituted args。清单中格式
//! 不合法或与已有工具重名的条目跳过并记警告，不影响其余条目。子进程守护
//! 超时属于插件体自身的约束。

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::config::PluginEntry;
use crate::tools::Tool;

/// 从配置条目构建的插件工具
pub struct PluginTool {
    name: String,
    description: String,
    program: String,
    arg_templates: Vec<String>,
    workspace: PathBuf,
    timeout_secs: u64,
}

impl PluginTool {
    pub fn new(entry: &PluginEntry, workspace: &Path, timeout_secs: u64) -> Self {
        Self {
            name: entry.name.clone(),
            description: entry.description.clone(),
            program: entry.program.clone(),
            arg_templates: entry.args.clone(),
            workspace: workspace.to_path_buf(),
            timeout_secs,
        }
    }

    /// 渲染参数模板：{{workspace}} 固定绑定沙箱根，其余 {{key}} 取自 args
    fn render_args(&self, args: &Value) -> Vec<String> {
        let mut bindings: Vec<(String, String)> = vec![(
            "{{workspace}}".to_string(),
            self.workspace.to_string_lossy().into_owned(),
        )];
        if let Some(obj) = args.as_object() {
            for (key, value) in obj {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                bindings.push((format!("{{{{{}}}}}", key), rendered));
            }
        }
        self.arg_templates
            .iter()
            .map(|template| {
                bindings
                    .iter()
                    .fold(template.clone(), |acc, (from, to)| acc.replace(from, to))
            })
            .collect()
    }
}

#[async_trait]
impl Tool for PluginTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let argv = self.render_args(&args);
        tracing::info!(tool = %self.name, program = %self.program, "plugin tool invoke");

        let child = Command::new(&self.program)
            .args(&argv)
            .current_dir(&self.workspace)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("Failed to start '{}': {}", self.program, e))?;

        let guard = Duration::from_secs(self.timeout_secs);
        let output = match tokio::time::timeout(guard, child.wait_with_output()).await {
            Ok(done) => done.map_err(|e| format!("Failed to collect output: {}", e))?,
            Err(_) => {
                return Err(format!(
                    "Plugin '{}' exceeded {}s",
                    self.name, self.timeout_secs
                ))
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!(
                "Exit {:?}: {}",
                output.status.code(),
                stderr.trim()
            ))
        }
    }
}

/// 按清单装配插件工具：空 name/program、与保留名或先前条目重名的一律跳过并
/// 记警告，合法条目按出现顺序构建
pub fn build_plugin_tools(
    entries: &[PluginEntry],
    workspace: &Path,
    timeout_secs: u64,
    reserved_names: &[String],
) -> Vec<PluginTool> {
    let mut seen: HashSet<&str> = reserved_names.iter().map(String::as_str).collect();
    let mut tools = Vec::new();
    for entry in entries {
        if entry.name.trim().is_empty() || entry.program.trim().is_empty() {
            tracing::warn!(
                name = %entry.name,
                program = %entry.program,
                "skipping malformed plugin entry"
            );
            continue;
        }
        if !seen.insert(entry.name.as_str()) {
            tracing::warn!(name = %entry.name, "skipping plugin entry with conflicting name");
            continue;
        }
        tools.push(PluginTool::new(entry, workspace, timeout_secs));
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, program: &str, args: &[&str]) -> PluginEntry {
        PluginEntry {
            name: name.to_string(),
            description: format!("{name} plugin"),
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_render_fills_workspace_and_arg_keys() {
        let dir = tempfile::tempdir().unwrap();
        let tool = PluginTool::new(
            &entry("greet", "echo", &["{{workspace}}/out", "{{who}}"]),
            dir.path(),
            5,
        );
        let args = serde_json::json!({"who": "world", "count": 3});
        let rendered = tool.render_args(&args);
        assert_eq!(rendered[0], format!("{}/out", dir.path().display()));
        assert_eq!(rendered[1], "world");
    }

    #[test]
    fn test_malformed_and_conflicting_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let reserved = vec!["echo".to_string()];
        let entries = vec![
            entry("", "cat", &[]),
            entry("no_program", "", &[]),
            entry("echo", "/bin/echo", &[]),
            entry("ok_tool", "/bin/true", &[]),
            entry("ok_tool", "/bin/true", &[]),
        ];
        let tools = build_plugin_tools(&entries, dir.path(), 5, &reserved);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "ok_tool");
    }

    #[tokio::test]
    async fn test_plugin_runs_program_and_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let tool = PluginTool::new(&entry("say", "echo", &["hi", "{{who}}"]), dir.path(), 5);
        let out = tool
            .execute(serde_json::json!({"who": "there"}))
            .await
            .unwrap();
        assert_eq!(out, "hi there");
    }
}
