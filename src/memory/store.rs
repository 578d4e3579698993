//! 长期记忆：跨请求的关键词检索存储
//!
//! Memory trait 支持 save(text, metadata) 与 recall(query, k)；当前实现为
//! InMemoryStore（关键词重叠打分，中文经 jieba 分词），条目数有上限，
//! 超出时淘汰最旧。后续可替换为真实向量库。

use std::collections::{HashMap, HashSet};
use std::sync::{OnceLock, RwLock};

use jieba_rs::Jieba;

/// 长期记忆 trait：写入带元数据的文本，按查询检索相关条目
pub trait Memory: Send + Sync {
    /// 存入一段文本与元数据（如 {"type": "chat", "timestamp": ...}）
    fn save(&self, text: &str, metadata: HashMap<String, String>);

    /// 按查询检索最相关的 max_results 条，按相关度降序；空库返回空列表
    fn recall(&self, query: &str, max_results: usize) -> Vec<String>;

    /// 调用方据此决定是否注入记忆上下文；Noop 返回 false
    fn enabled(&self) -> bool {
        true
    }
}

/// 空实现：未启用记忆时使用
#[derive(Clone, Default)]
pub struct NoopMemory;

impl Memory for NoopMemory {
    fn save(&self, _text: &str, _metadata: HashMap<String, String>) {}

    fn recall(&self, _query: &str, _max_results: usize) -> Vec<String> {
        Vec::new()
    }

    fn enabled(&self) -> bool {
        false
    }
}

/// 词典加载开销大，进程内只做一次
static JIEBA: OnceLock<Jieba> = OnceLock::new();

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}' |   // CJK Unified Ideographs
        '\u{3400}'..='\u{4DBF}' |   // Extension A
        '\u{F900}'..='\u{FAFF}' |   // Compatibility Ideographs
        '\u{3040}'..='\u{309F}' |   // Hiragana
        '\u{30A0}'..='\u{30FF}'     // Katakana
    )
}

/// 按内容选择分词策略：含 CJK 用 jieba（搜索引擎模式），否则按空格切分
fn tokenize(text: &str) -> HashSet<String> {
    let text = text.trim();
    if text.is_empty() {
        return HashSet::new();
    }
    if text.chars().any(is_cjk) {
        JIEBA
            .get_or_init(Jieba::new)
            .cut_for_search(text, true)
            .into_iter()
            .map(|s| s.to_lowercase())
            .filter(|s| s.len() > 1 || s.chars().next().map(is_cjk).unwrap_or(false))
            .collect()
    } else {
        text.split_whitespace()
            .map(|s| s.to_lowercase())
            .filter(|s| s.len() > 1)
            .collect()
    }
}

struct StoredEntry {
    text: String,
    tokens: HashSet<String>,
    #[allow(dead_code)]
    metadata: HashMap<String, String>,
}

/// 简单内存实现：按关键词重叠打分检索（无真实向量）
pub struct InMemoryStore {
    entries: RwLock<Vec<StoredEntry>>,
    max_entries: usize,
}

impl InMemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Memory for InMemoryStore {
    fn save(&self, text: &str, metadata: HashMap<String, String>) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let tokens = tokenize(text);
        let mut entries = self.entries.write().unwrap();
        entries.push(StoredEntry {
            text: text.to_string(),
            tokens,
            metadata,
        });
        let n = entries.len();
        if n > self.max_entries {
            entries.drain(0..n - self.max_entries);
        }
    }

    fn recall(&self, query: &str, max_results: usize) -> Vec<String> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }
        let entries = self.entries.read().unwrap();
        let mut scored: Vec<(usize, &str)> = entries
            .iter()
            .map(|e| (query_tokens.intersection(&e.tokens).count(), e.text.as_str()))
            .filter(|(score, _)| *score > 0)
            .collect();
        // 稳定排序：同分保持写入顺序
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(max_results)
            .map(|(_, t)| t.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> HashMap<String, String> {
        HashMap::from([("type".to_string(), "test".to_string())])
    }

    #[test]
    fn test_recall_on_empty_store_is_empty() {
        let store = InMemoryStore::new(10);
        assert!(store.recall("anything", 5).is_empty());
    }

    #[test]
    fn test_recall_orders_by_overlap() {
        let store = InMemoryStore::new(10);
        store.save("rust borrow checker rules", meta());
        store.save("python packaging notes", meta());
        store.save("rust async runtime and borrow rules", meta());
        let hits = store.recall("rust borrow rules", 2);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].contains("rust"));
        assert!(!hits.iter().any(|h| h.contains("python")));
    }

    #[test]
    fn test_recall_matches_chinese_queries() {
        let store = InMemoryStore::new(10);
        store.save("[Chat] User: 我喜欢编程\nAgent: 很高兴听到", meta());
        store.save("[Chat] User: weather talk\nAgent: sunny", meta());
        let hits = store.recall("编程相关的记录", 5);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains("编程"));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let store = InMemoryStore::new(2);
        store.save("first entry about cats", meta());
        store.save("second entry about dogs", meta());
        store.save("third entry about birds", meta());
        assert_eq!(store.len(), 2);
        assert!(store.recall("cats", 5).is_empty());
        assert_eq!(store.recall("birds", 5).len(), 1);
    }

    #[test]
    fn test_noop_memory_is_disabled() {
        let noop = NoopMemory;
        noop.save("ignored", meta());
        assert!(noop.recall("ignored", 3).is_empty());
        assert!(!noop.enabled());
    }
}
