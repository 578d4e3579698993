//! 记忆层：跨请求的长期检索存储

pub mod store;

pub use store::{InMemoryStore, Memory, NoopMemory};
