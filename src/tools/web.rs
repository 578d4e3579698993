//! web_scrape 工具：域名白名单、结果大小限制
//!
//! 仅允许配置中的域名（如 wikipedia、docs.rs）；响应超过 max_result_chars
//! 时截断并追加 ...[truncated]。对 HTML 响应使用 html2text 提取可读文本。
//! 请求超时属于 HTTP 客户端自身的约束，编排内核不干预。

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;
use serde_json::Value;

use crate::tools::Tool;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";

/// 取 URL 的 host：要求 http(s) scheme，去掉端口、路径与查询串，统一小写
fn host_of(url: &str) -> Option<String> {
    let (scheme, rest) = url.trim().split_once("://")?;
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let host = rest.split(['/', '?', '#']).next()?.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// 响应体嗅探：开头是标签或带典型 HTML 结构时按 HTML 处理
fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    if head.starts_with("<!") {
        return true;
    }
    if head
        .get(..5)
        .map(|p| p.eq_ignore_ascii_case("<html"))
        .unwrap_or(false)
    {
        return true;
    }
    head.contains('<') && (head.contains("</") || head.contains("<head") || head.contains("<title"))
}

/// web_scrape 工具：抓取 URL 的可读文本，仅允许白名单域名
pub struct WebScrapeTool {
    client: Client,
    allowed_domains: HashSet<String>,
    max_result_chars: usize,
}

impl WebScrapeTool {
    pub fn new(allowed_domains: Vec<String>, timeout_secs: u64, max_result_chars: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            allowed_domains: allowed_domains
                .into_iter()
                .map(|d| d.to_ascii_lowercase())
                .collect(),
            max_result_chars,
        }
    }

    fn check_allowed(&self, url: &str) -> Result<(), String> {
        let host =
            host_of(url).ok_or_else(|| "URL must start with http:// or https://".to_string())?;
        if self.allowed_domains.contains(&host) {
            Ok(())
        } else {
            Err(format!("Domain '{}' not in allowlist", host))
        }
    }

    fn clip(&self, text: String) -> String {
        if text.chars().count() > self.max_result_chars {
            let cut: String = text.chars().take(self.max_result_chars).collect();
            cut + "\n...[truncated]"
        } else {
            text
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        self.check_allowed(url)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Fetch failed: {}", e))?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        let mut body = response
            .text()
            .await
            .map_err(|e| format!("Body read failed: {}", e))?;

        // BOM 会让 HTML 嗅探失配
        if let Some(stripped) = body.strip_prefix('\u{FEFF}') {
            body = stripped.to_string();
        }

        let text = if looks_like_html(&body) {
            match from_read(body.as_bytes(), 120) {
                Ok(text) if !text.trim().is_empty() => text,
                _ => body,
            }
        } else {
            body
        };

        Ok(self.clip(text))
    }
}

#[async_trait]
impl Tool for WebScrapeTool {
    fn name(&self) -> &str {
        "web_scrape"
    }

    fn description(&self) -> &str {
        "Fetch a URL and return its readable text (domain allowlist applies). Args: {\"url\": \"https://...\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Full http(s) URL to fetch" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let url = args.get("url").and_then(Value::as_str).unwrap_or("").trim();
        if url.is_empty() {
            return Err("Missing url".to_string());
        }
        tracing::info!(url = %url, "web_scrape tool fetch");
        self.fetch(url).await
    }
}
