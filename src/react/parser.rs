//! 循环输出解析：Action / Action Input / Final Answer 标记
//!
//! 宽松解析：只取第一处 Action（每轮至多一次工具调用），Action Input 缺失或
//! JSON 损坏时退化为空对象；Final Answer 取最后一次出现之后的文本。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

const FINAL_ANSWER_MARKER: &str = "Final Answer:";

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Action:\s*([A-Za-z0-9_]+)").unwrap())
}

fn action_input_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)Action Input:\s*(\{.*?\})").unwrap())
}

/// 解析一次工具动作：Action 名 + Action Input JSON 对象。
/// 没有 Action 标记返回 None；Input 缺失或非法 JSON 时用空对象。
pub fn parse_action(text: &str) -> Option<(String, Value)> {
    let action = action_re().captures(text)?.get(1)?.as_str().to_string();
    let input = action_input_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| match serde_json::from_str::<Value>(m.as_str()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(error = %e, "action input JSON parse failed, using empty object");
                None
            }
        })
        .unwrap_or_else(|| serde_json::json!({}));
    Some((action, input))
}

/// 终止标记检测：文本任意位置含 Final Answer: 即终止，取最后一次出现之后的
/// 文本（去除首尾空白）
pub fn extract_final_answer(text: &str) -> Option<String> {
    text.rfind(FINAL_ANSWER_MARKER)
        .map(|idx| text[idx + FINAL_ANSWER_MARKER.len()..].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_action_with_json_input() {
        let text = "Thought: need data\nAction: web_scrape\nAction Input: {\"url\": \"https://a.b\"}";
        let (action, input) = parse_action(text).unwrap();
        assert_eq!(action, "web_scrape");
        assert_eq!(input["url"], "https://a.b");
    }

    #[test]
    fn test_only_first_action_is_taken() {
        let text = "Action: echo\nAction Input: {\"text\": \"one\"}\nAction: write_file\nAction Input: {\"path\": \"x\"}";
        let (action, input) = parse_action(text).unwrap();
        assert_eq!(action, "echo");
        assert_eq!(input["text"], "one");
    }

    #[test]
    fn test_malformed_input_degrades_to_empty_object() {
        // 没有闭合大括号，正则不匹配
        let (action, input) = parse_action("Action: echo\nAction Input: {broken json]").unwrap();
        assert_eq!(action, "echo");
        assert_eq!(input, serde_json::json!({}));

        // 正则匹配到片段但不是合法 JSON
        let (action, input) = parse_action("Action: echo\nAction Input: {\"text\": }").unwrap();
        assert_eq!(action, "echo");
        assert_eq!(input, serde_json::json!({}));
    }

    #[test]
    fn test_missing_input_degrades_to_empty_object() {
        let (action, input) = parse_action("Action: list_dir").unwrap();
        assert_eq!(action, "list_dir");
        assert_eq!(input, serde_json::json!({}));
    }

    #[test]
    fn test_no_action_marker_yields_none() {
        assert!(parse_action("I am still thinking about it.").is_none());
        assert!(parse_action("").is_none());
    }

    #[test]
    fn test_final_answer_takes_text_after_last_occurrence() {
        let text = "Final Answer: draft\nsome more thought\nFinal Answer: the real one\n";
        assert_eq!(extract_final_answer(text).unwrap(), "the real one");
        assert!(extract_final_answer("no marker").is_none());
    }

    #[test]
    fn test_final_answer_with_nothing_after_is_empty() {
        assert_eq!(extract_final_answer("Final Answer:").unwrap(), "");
    }

    #[test]
    fn test_multiline_input_spans_lines() {
        let text = "Action: write_file\nAction Input: {\"path\": \"a.txt\",\n\"content\": \"line\"}";
        let (_, input) = parse_action(text).unwrap();
        assert_eq!(input["path"], "a.txt");
        assert_eq!(input["content"], "line");
    }
}
