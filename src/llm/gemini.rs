//! Gemini API 客户端（OpenAI 兼容格式）
//!
//! Google 为 Gemini 提供 OpenAI 兼容入口。
//! - Base URL: https://generativelanguage.googleapis.com/v1beta/openai
//! - 默认模型: gemini-2.0-flash

use crate::llm::OpenAiClient;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const GEMINI_FLASH: &str = "gemini-2.0-flash";

/// 创建 Gemini 客户端；`model` 为空时使用 gemini-2.0-flash
pub fn create_gemini_client(model: Option<&str>, api_key: &str) -> OpenAiClient {
    let model = model
        .filter(|m| !m.is_empty())
        .unwrap_or(GEMINI_FLASH);
    OpenAiClient::new(Some(GEMINI_BASE_URL), model, api_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_has_no_trailing_slash() {
        assert!(!GEMINI_BASE_URL.ends_with('/'));
    }

    #[test]
    fn test_default_model() {
        assert_eq!(create_gemini_client(None, "k").model(), GEMINI_FLASH);
        assert_eq!(create_gemini_client(Some(""), "k").model(), GEMINI_FLASH);
        assert_eq!(
            create_gemini_client(Some("gemini-1.5-pro"), "k").model(),
            "gemini-1.5-pro"
        );
    }
}
