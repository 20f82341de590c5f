//! 智能体间通信：消息格式与优先级邮箱

pub mod mailbox;
pub mod message;

pub use mailbox::{Listener, Mailbox};
pub use message::{roles, Intent, Message, Priority, DEFAULT_TTL_SECS};
