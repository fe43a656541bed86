//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / Mock）实现 LlmClient。返回值在边界处就区分为
//! 文本与结构化两种形态（ModelReply），下游不再检查运行时类型。

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::Message;

/// 模型回复：普通文本，或上游偶尔返回的结构化内容（非文本）
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    Structured(serde_json::Value),
}

impl ModelReply {
    /// 作为原始文本使用：结构化内容序列化为紧凑 JSON
    pub fn into_text(self) -> String {
        match self {
            ModelReply::Text(s) => s,
            ModelReply::Structured(v) => v.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("model returned no choices")]
    EmptyResponse,

    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// Mock 脚本耗尽或脚本化错误
    #[error("scripted failure: {0}")]
    Script(String),
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<ModelReply, LlmError>;

    /// 单条 prompt 调用（作为一条 User 消息发送）
    async fn invoke(&self, prompt: &str) -> Result<ModelReply, LlmError> {
        self.complete(&[Message::user(prompt)]).await
    }

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_text() {
        assert_eq!(ModelReply::Text("hi".into()).into_text(), "hi");
        let v = json!([{"type": "text", "text": "a"}]);
        assert_eq!(
            ModelReply::Structured(v).into_text(),
            r#"[{"text":"a","type":"text"}]"#
        );
    }
}
