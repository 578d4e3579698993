//! 核心编排层：错误类型与主编排器

pub mod error;
pub mod orchestrator;

pub use error::AgentError;
pub use orchestrator::{Orchestrator, SOCIETY_NO_REPLY};
