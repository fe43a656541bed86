//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按 FIFO 顺序返回预设回复或错误；脚本为空时回显最后一条 User 消息。记录每次收到的 prompt。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message, ModelReply, Role};

/// Mock 客户端：脚本化回复 + 调用记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<ModelReply, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条文本回复
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(ModelReply::Text(text.into())));
        self
    }

    /// 追加一条结构化回复
    pub fn with_structured(self, value: serde_json::Value) -> Self {
        self.push(Ok(ModelReply::Structured(value)));
        self
    }

    /// 追加一次失败
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    fn push(&self, item: Result<ModelReply, String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(item);
        }
    }

    /// 已收到的 prompt（每次调用的最后一条 User 消息）
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<ModelReply, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_else(|| "(no input)".to_string());

        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(last_user.clone());
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(LlmError::Script(e)),
            None => Ok(ModelReply::Text(format!("Echo from Mock: {}", last_user))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_order_then_echo() {
        let mock = MockLlmClient::new().with_text("first").with_error("boom");

        assert_eq!(
            mock.invoke("a").await.unwrap(),
            ModelReply::Text("first".into())
        );
        assert!(matches!(mock.invoke("b").await, Err(LlmError::Script(_))));
        assert_eq!(
            mock.invoke("c").await.unwrap(),
            ModelReply::Text("Echo from Mock: c".into())
        );
        assert_eq!(mock.prompts(), vec!["a", "b", "c"]);
    }
}
