//! 组件装配
//!
//! 供各平台入口调用：按配置创建模型客户端、记忆存储、压缩器与备份写入器，组装成 MessageHandler。

use std::sync::Arc;

use crate::bot::{load_persona, MessageHandler};
use crate::config::{AppConfig, LlmSection};
use crate::llm::{create_gemini_client, LlmClient, OpenAiClient};
use crate::memory::{BackupWriter, FileBackupWriter, MemoryCompressor, MemoryStore, NoopBackupWriter};

/// 按 [llm] 段创建客户端：openai 走 OpenAI 兼容端点（可配 base_url），其余走 Gemini
pub fn create_llm_from_config(llm: &LlmSection, api_key: &str) -> Arc<dyn LlmClient> {
    let model = (!llm.model.is_empty()).then_some(llm.model.as_str());
    let client = match llm.provider.as_str() {
        "openai" => OpenAiClient::new(
            llm.base_url.as_deref(),
            model.unwrap_or("gpt-4o-mini"),
            api_key,
        ),
        other => {
            if other != "gemini" {
                tracing::warn!("Unknown llm.provider {:?}, falling back to gemini", other);
            }
            match llm.base_url.as_deref() {
                Some(url) => OpenAiClient::new(
                    Some(url),
                    model.unwrap_or(crate::llm::GEMINI_FLASH),
                    api_key,
                ),
                None => create_gemini_client(model, api_key),
            }
        }
    };
    tracing::info!("LLM provider={} model={}", llm.provider, client.model());
    Arc::new(client.with_timeout_secs(llm.timeouts.request))
}

/// 按 [memory] 段创建备份写入器
pub fn create_backup_writer(cfg: &AppConfig) -> Arc<dyn BackupWriter> {
    if cfg.memory.backup_enabled {
        Arc::new(
            FileBackupWriter::new(&cfg.memory.backup_dir).with_prefix(cfg.memory.backup_prefix.clone()),
        )
    } else {
        Arc::new(NoopBackupWriter)
    }
}

/// 组装 MessageHandler；模型客户端由调用方传入，便于替换为 Mock
pub fn create_handler(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> MessageHandler {
    let persona = load_persona(cfg.bot.persona_path.as_deref());
    let store = Arc::new(MemoryStore::new());
    let compressor = MemoryCompressor::new(Arc::clone(&llm), create_backup_writer(cfg));
    MessageHandler::new(persona, llm, store, compressor, cfg.bot.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::{HandleOutcome, IncomingMessage, Replier};
    use crate::core::BotError;
    use crate::llm::MockLlmClient;

    struct Sink;

    #[async_trait::async_trait]
    impl Replier for Sink {
        async fn reply(&self, _text: &str) -> Result<(), BotError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_backup_disabled_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = AppConfig::default();
        cfg.memory.backup_enabled = false;
        cfg.memory.backup_dir = tmp.path().join("backups");

        let llm = Arc::new(MockLlmClient::new().with_text("Hi!").with_text("memory"));
        let handler = create_handler(&cfg, llm);
        let msg = IncomingMessage {
            message_id: "m1".into(),
            channel_id: "c1".into(),
            author_id: "u1".into(),
            mentions: vec!["bot".into()],
            content: "hello".into(),
            ..Default::default()
        };

        let outcome = handler.handle(&msg, "bot", &Sink).await;
        assert_eq!(outcome, HandleOutcome::Replied { chunks: 1 });
        assert!(!cfg.memory.backup_dir.exists());
    }

    #[test]
    fn test_configured_base_url_is_normalized() {
        let section = LlmSection {
            base_url: Some("https://proxy.example.com/v1/".into()),
            ..Default::default()
        };
        assert_eq!(
            crate::llm::normalize_api_base(section.base_url.as_deref().unwrap()),
            "https://proxy.example.com/v1"
        );
        let client = create_llm_from_config(&section, "k");
        assert_eq!(client.token_usage(), (0, 0, 0));
    }

    #[test]
    fn test_openai_provider_uses_configured_model() {
        let section = LlmSection {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            base_url: Some("http://localhost:8080/v1".into()),
            ..Default::default()
        };
        let client = create_llm_from_config(&section, "k");
        assert_eq!(client.token_usage(), (0, 0, 0));
    }
}
