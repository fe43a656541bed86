//! 消息处理：过滤 -> 组 prompt -> 调模型 -> 分片回复 -> 压缩记忆
//!
//! 每条入站消息一次 `handle`：
//! 1. Bot 账号发的消息忽略（防止互相回复）
//! 2. 没有 @ 本 Bot 的消息忽略
//! 3. 命中 debug 关键字：原样回复该用户当前记忆，不调模型、不改记忆
//! 4. 人设 + 记忆 + 用户消息 -> 模型
//! 5. 结构化回复：包成带标签的代码块回一条，跳过记忆更新
//! 6. 文本回复：按 chunk_size 分片依次回复
//! 7. (旧记忆, 消息, 回复) -> 压缩器 -> 写回记忆
//! 8. 4~7 任一步出错：只记日志，对用户回一条通用失败文案，记忆保持不变
//!
//! 同一用户的消息在记忆槽位锁上串行执行。

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::bot::chunk::chunk_reply;
use crate::bot::event::{IncomingMessage, Replier};
use crate::config::{BotSection, DebugMatch};
use crate::core::BotError;
use crate::llm::{LlmClient, LlmError, ModelReply};
use crate::memory::{MemoryCompressor, MemoryStore};

/// 忽略原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    FromBot,
    NotMentioned,
}

/// 单条消息的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Ignored(IgnoreReason),
    /// debug 路径：回复了当前记忆
    DebugDump,
    /// 模型返回结构化内容，已回显，记忆未更新
    Structured,
    /// 正常回复并更新了记忆
    Replied { chunks: usize },
    /// 出错，已回复通用失败文案
    Failed,
}

/// 一次正常对话的产物
enum Exchange {
    Structured,
    Replied { chunks: usize, new_memory: String },
}

/// 消息处理器：人设、模型、记忆存储与压缩器均由外部注入
pub struct MessageHandler {
    persona: String,
    llm: Arc<dyn LlmClient>,
    store: Arc<MemoryStore>,
    compressor: MemoryCompressor,
    settings: BotSection,
}

impl MessageHandler {
    pub fn new(
        persona: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        store: Arc<MemoryStore>,
        compressor: MemoryCompressor,
        settings: BotSection,
    ) -> Self {
        Self {
            persona: persona.into(),
            llm,
            store,
            compressor,
            settings,
        }
    }

    /// 生成回复用的 prompt：人设 + 记忆（非空时）+ 用户消息
    pub fn build_prompt(&self, memory: &str, message: &str) -> String {
        let mut prompt = self.persona.clone();
        if !memory.trim().is_empty() {
            prompt.push_str("\n\n## これまでの会話の記憶\n");
            prompt.push_str(memory);
        }
        prompt.push_str("\n\n## ユーザーのメッセージ\n");
        prompt.push_str(message);
        prompt
    }

    fn is_debug(&self, content: &str) -> bool {
        let keyword = self.settings.debug_keyword.as_str();
        if keyword.is_empty() {
            return false;
        }
        match self.settings.debug_match {
            DebugMatch::Substring => content.contains(keyword),
            DebugMatch::Prefix => content.trim_start().starts_with(keyword),
        }
    }

    /// 处理一条入站消息；`bot_user_id` 为本 Bot 在平台上的用户 ID
    pub async fn handle(
        &self,
        msg: &IncomingMessage,
        bot_user_id: &str,
        replier: &dyn Replier,
    ) -> HandleOutcome {
        if msg.author_is_bot {
            return HandleOutcome::Ignored(IgnoreReason::FromBot);
        }
        if !msg.mentions_user(bot_user_id) {
            return HandleOutcome::Ignored(IgnoreReason::NotMentioned);
        }

        let text = strip_mention(&msg.content, bot_user_id);
        tracing::info!(
            "Accepted message {} from user={} len={}",
            msg.message_id,
            msg.author_id,
            text.chars().count()
        );

        let slot = self.store.entry(&msg.author_id).await;
        let mut memory = slot.lock().await;

        let result = if self.is_debug(&text) {
            self.dump_memory(&memory, replier).await
        } else {
            match self.exchange(&memory, &text, replier).await {
                Ok(Exchange::Structured) => Ok(HandleOutcome::Structured),
                Ok(Exchange::Replied { chunks, new_memory }) => {
                    *memory = new_memory;
                    Ok(HandleOutcome::Replied { chunks })
                }
                Err(e) => Err(e),
            }
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    "Failed to handle message {} from user={}: {}",
                    msg.message_id,
                    msg.author_id,
                    e
                );
                if let Err(e) = replier.reply(&self.settings.failure_message).await {
                    tracing::error!("Failed to deliver failure notice: {}", e);
                }
                HandleOutcome::Failed
            }
        }
    }

    async fn dump_memory(
        &self,
        memory: &str,
        replier: &dyn Replier,
    ) -> Result<HandleOutcome, BotError> {
        let body = if memory.is_empty() {
            self.settings.empty_memory_notice.as_str()
        } else {
            memory
        };
        replier.reply(body).await?;
        Ok(HandleOutcome::DebugDump)
    }

    async fn exchange(
        &self,
        memory: &str,
        text: &str,
        replier: &dyn Replier,
    ) -> Result<Exchange, BotError> {
        let prompt = self.build_prompt(memory, text);
        let reply = match self.llm.invoke(&prompt).await? {
            ModelReply::Structured(value) => {
                tracing::warn!("Model returned structured content, echoing it back");
                let body = format!("{}\n```{}```", self.settings.structured_label, value);
                replier.reply(&body).await?;
                return Ok(Exchange::Structured);
            }
            ModelReply::Text(reply) => reply,
        };
        // 空白回复无从投递，按模型失败处理，不压缩
        if reply.trim().is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }

        let chunks = chunk_reply(&reply, self.settings.chunk_size);
        for chunk in &chunks {
            replier.reply(chunk).await?;
        }

        let new_memory = self.compressor.compress(memory, text, &reply).await?;
        let (prompt_tokens, completion_tokens, total) = self.llm.token_usage();
        tracing::debug!(
            "Token usage so far: prompt={} completion={} total={}",
            prompt_tokens,
            completion_tokens,
            total
        );

        Ok(Exchange::Replied {
            chunks: chunks.len(),
            new_memory,
        })
    }
}

static MENTION_RE: OnceLock<Regex> = OnceLock::new();

/// 去掉对本 Bot 的 @ 提及（`<@id>` / `<@!id>`），其他用户的提及保留
pub fn strip_mention(content: &str, bot_user_id: &str) -> String {
    let re = MENTION_RE.get_or_init(|| Regex::new(r"<@!?(\d+)>\s*").expect("valid mention regex"));
    re.replace_all(content, |caps: &regex::Captures| {
        if &caps[1] == bot_user_id {
            String::new()
        } else {
            caps[0].to_string()
        }
    })
    .trim()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_mention() {
        assert_eq!(strip_mention("<@42> hello", "42"), "hello");
        assert_eq!(strip_mention("<@!42>hello", "42"), "hello");
        assert_eq!(strip_mention("hey <@7> and <@42> hi", "42"), "hey <@7> and hi");
        assert_eq!(strip_mention("no mention", "42"), "no mention");
    }
}
