//! Bot 层：人设、回复分片、消息处理主流程

pub mod chunk;
pub mod event;
pub mod handler;
pub mod persona;

pub use chunk::{chunk_reply, DEFAULT_CHUNK_SIZE};
pub use event::{IncomingMessage, Replier};
pub use handler::{strip_mention, HandleOutcome, IgnoreReason, MessageHandler};
pub use persona::{load_persona, DEFAULT_PERSONA};
