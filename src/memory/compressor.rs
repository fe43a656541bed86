//! 记忆压缩
//!
//! (旧记忆, 用户消息, Bot 回复) -> 模型生成的新记忆。新记忆整体替换旧记忆，不做追加；
//! 模型原样输出即为新记忆，不校验长度或格式。成功后写一份备份，备份失败只记日志。

use std::sync::Arc;

use crate::core::BotError;
use crate::llm::LlmClient;
use crate::memory::BackupWriter;

/// 压缩指令（固定前言，后接三段输入）
pub const COMPRESSION_INSTRUCTION: &str = "\
あなたは会話の記憶を整理する係です。以下は、あるユーザーとあなたのこれまでの会話の要約と、直近のやり取りです。\n\
人間の記憶のように、印象に残った出来事や話題、相手の好み、やり取りに込められた感情やニュアンスは、明示されていなくても汲み取って残してください。\n\
重要でない細部は忘れてかまいません。\n\
出力は新しい要約の本文だけにしてください。以前の要約に追記するのではなく、以前の要約を置き換える完全な要約を書いてください。\n";

/// 空的旧记忆在 prompt 中的占位
const NO_PREVIOUS_MEMORY: &str = "（まだ記憶はありません）";

/// 记忆压缩器：持有模型客户端与备份写入器
pub struct MemoryCompressor {
    llm: Arc<dyn LlmClient>,
    backup: Arc<dyn BackupWriter>,
}

impl MemoryCompressor {
    pub fn new(llm: Arc<dyn LlmClient>, backup: Arc<dyn BackupWriter>) -> Self {
        Self { llm, backup }
    }

    /// 构造压缩 prompt
    pub fn build_prompt(previous_memory: &str, user_message: &str, bot_reply: &str) -> String {
        let previous = if previous_memory.trim().is_empty() {
            NO_PREVIOUS_MEMORY
        } else {
            previous_memory
        };
        format!(
            "{}\n## これまでの要約\n{}\n\n## ユーザーの発言\n{}\n\n## あなたの返答\n{}\n",
            COMPRESSION_INSTRUCTION, previous, user_message, bot_reply
        )
    }

    /// 生成新记忆；模型失败时直接返回错误，不写备份
    pub async fn compress(
        &self,
        previous_memory: &str,
        user_message: &str,
        bot_reply: &str,
    ) -> Result<String, BotError> {
        let prompt = Self::build_prompt(previous_memory, user_message, bot_reply);
        let new_memory = self.llm.invoke(&prompt).await?.into_text();

        match self.backup.write(&new_memory).await {
            Ok(path) => tracing::debug!("Memory backup written: {}", path.display()),
            Err(e) => tracing::warn!("Memory backup failed, continuing: {}", e),
        }

        Ok(new_memory)
    }
}
