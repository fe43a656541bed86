//! 平台无关的入站消息与回复接口

use async_trait::async_trait;

use crate::core::BotError;

/// 入站消息（由平台集成从原始事件解码）
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    pub message_id: String,
    pub channel_id: String,
    pub author_id: String,
    pub author_is_bot: bool,
    /// 被 @ 的用户 ID 列表
    pub mentions: Vec<String>,
    pub content: String,
}

impl IncomingMessage {
    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|id| id == user_id)
    }
}

/// 对触发消息的回复，每段分片调用一次
#[async_trait]
pub trait Replier: Send + Sync {
    async fn reply(&self, text: &str) -> Result<(), BotError>;
}
