//! 认知层：输出解析器与有界工具推理循环

pub mod loop_;
pub mod parser;

pub use loop_::{ReactLoop, DEFAULT_MAX_ITERATIONS};
pub use parser::{extract_final_answer, parse_action};
