//! 记忆层：单次 run 的对话日志

pub mod conversation;

pub use conversation::{Memory, Message, Role, SlidingWindowMemory, UnconstrainedMemory};
