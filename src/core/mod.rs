//! 核心：错误类型、关闭信号

pub mod error;
pub mod shutdown;

pub use error::BotError;
pub use shutdown::ShutdownManager;
