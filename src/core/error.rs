//! Bot 错误类型
//!
//! Handler 顶层统一捕获：Llm / Delivery 走通用失败回复；Backup 仅在本地记录日志，不打断用户流程。

use thiserror::Error;

use crate::llm::LlmError;

/// Bot 运行过程中可能出现的错误（模型调用、消息投递、备份写入、启动密钥、Gateway）
#[derive(Error, Debug)]
pub enum BotError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// 平台回复投递失败（HTTP 非 2xx、网络错误）
    #[error("Reply delivery failed: {0}")]
    Delivery(String),

    #[error("Backup write failed: {0}")]
    Backup(String),

    /// 启动时缺少必需的密钥（Discord Token / 模型 API Key）
    #[error("Missing required secret: {0}")]
    MissingSecret(&'static str),

    #[error("Gateway error: {0}")]
    Gateway(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_converts() {
        let err: BotError = LlmError::EmptyResponse.into();
        assert!(matches!(err, BotError::Llm(LlmError::EmptyResponse)));
        assert!(err.to_string().starts_with("LLM error"));
    }

    #[test]
    fn test_missing_secret_message() {
        let err = BotError::MissingSecret("DISCORD_TOKEN");
        assert_eq!(err.to_string(), "Missing required secret: DISCORD_TOKEN");
    }
}
