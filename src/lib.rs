//! Memobot - Discord 角色聊天机器人
//!
//! 模块划分：
//! - **app**: 组件装配（模型客户端、记忆、备份 -> MessageHandler）
//! - **bot**: 人设、回复分片、消息处理主流程（过滤 / 组 prompt / 回复 / 压缩记忆）
//! - **config**: 应用配置加载（TOML + 环境变量）与启动密钥
//! - **core**: 错误类型、关闭信号
//! - **integrations**: 聊天平台接入（Discord Gateway + REST）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）
//! - **memory**: 按用户的压缩记忆、压缩器、审计备份
//! - **observability**: 日志初始化

pub mod app;
pub mod bot;
pub mod config;
pub mod core;
pub mod integrations;
pub mod llm;
pub mod memory;
pub mod observability;

pub use bot::MessageHandler;
pub use memory::{MemoryCompressor, MemoryStore};
