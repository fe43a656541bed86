//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；Gemini 走其 OpenAI 兼容入口。
//! 首条 choice 有文本内容时返回 Text，没有文本（tool call、refusal 等）时把整条消息作为 Structured 返回。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message, ModelReply, Role};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// async-openai 以 `api_base + "/chat/completions"` 拼接路径，末尾的 `/` 需去掉
pub fn normalize_api_base(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// OpenAI 兼容客户端：持有 Client、model 名与单次请求超时
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Option<Duration>,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str) -> Self {
        let config = match base_url {
            Some(url) => OpenAIConfig::new()
                .with_api_base(normalize_api_base(url))
                .with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            request_timeout: None,
            usage: TokenUsage::new(),
        }
    }

    /// 单次请求超时（秒）；0 表示不限
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        messages
            .iter()
            .map(|m| {
                let msg = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::System),
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::User),
                    Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::Assistant),
                };
                msg.map_err(|e| LlmError::Request(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message]) -> Result<ModelReply, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.to_openai_messages(messages)?)
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let chat = self.client.chat();
        let call = chat.create(request);
        let response = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| LlmError::Timeout(limit.as_secs()))?,
            None => call.await,
        }
        .map_err(|e| LlmError::Request(e.to_string()))?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let choice = response.choices.first().ok_or(LlmError::EmptyResponse)?;
        match &choice.message.content {
            Some(text) => Ok(ModelReply::Text(text.clone())),
            None => serde_json::to_value(&choice.message)
                .map(ModelReply::Structured)
                .map_err(|e| LlmError::Request(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_normalize_api_base() {
        assert_eq!(normalize_api_base("http://h/v1/"), "http://h/v1");
        assert_eq!(normalize_api_base("http://h/v1//"), "http://h/v1");
        assert_eq!(normalize_api_base("http://h/v1"), "http://h/v1");
    }

    /// 本地监听一个端口，取第一条请求行后回 400
    async fn capture_request_line(listener: TcpListener) -> String {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(2).any(|w| w == b"\r\n") {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = r#"{"error":{"message":"bad","type":"invalid_request_error","param":null,"code":null}}"#;
        let resp = format!(
            "HTTP/1.1 400 Bad Request\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = socket.write_all(resp.as_bytes()).await;
        let text = String::from_utf8_lossy(&buf).to_string();
        text.lines().next().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_trailing_slash_base_builds_single_slash_path() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(capture_request_line(listener));

        let base = format!("http://{}/v1beta/openai/", addr);
        let client = OpenAiClient::new(Some(&base), "gemini-2.0-flash", "k").with_timeout_secs(5);
        tokio::spawn(async move {
            let _ = client.invoke("hi").await;
        });

        let line = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line, "POST /v1beta/openai/chat/completions HTTP/1.1");
    }
}
