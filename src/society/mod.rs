//! 智能体社会：消息信封、契约、注册表与三个具体智能体
//!
//! 投递是同步调用链：send → dispatch → receive → decide 在同一调用树内完成，
//! 回复沿返回值回传，没有队列与后台投递。

pub mod actor;
pub mod manager;
pub mod message;
pub mod registry;
pub mod researcher;
pub mod writer;

pub use actor::{Agent, AgentCore};
pub use manager::{ManagerAgent, DEFAULT_MANAGER_PERSONA, MANAGER_NAME};
pub use message::{AgentMessage, MessageKind};
pub use registry::AgentRegistry;
pub use researcher::{ResearcherAgent, DEFAULT_RESEARCHER_PERSONA, RESEARCHER_NAME};
pub use writer::{WriterAgent, DEFAULT_WRITER_PERSONA, WRITER_NAME};
