//! 按用户隔离的压缩记忆
//!
//! user_id -> 当前压缩记忆文本。首次访问时惰性创建为空串；进程生命周期内不淘汰。
//! 每个用户一个槽位（Arc<Mutex<String>>），Handler 在整轮对话期间持有该槽位的锁，
//! 同一用户的并发消息因此串行执行，读-改-写不会交错。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

/// 单个用户的记忆槽位
pub type MemorySlot = Arc<Mutex<String>>;

/// 记忆存储：显式注入 Handler，而非全局单例
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemorySlot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取或创建用户的记忆槽位
    pub async fn entry(&self, user_id: &str) -> MemorySlot {
        {
            let entries = self.entries.read().await;
            if let Some(slot) = entries.get(user_id) {
                return Arc::clone(slot);
            }
        }

        let mut entries = self.entries.write().await;
        Arc::clone(
            entries
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(String::new()))),
        )
    }

    /// 读取记忆；不存在时返回空串并创建条目
    pub async fn get(&self, user_id: &str) -> String {
        let slot = self.entry(user_id).await;
        let memory = slot.lock().await;
        memory.clone()
    }

    /// 覆盖写入记忆
    pub async fn set(&self, user_id: &str, memory_text: impl Into<String>) {
        let slot = self.entry(user_id).await;
        *slot.lock().await = memory_text.into();
    }

    /// 已有记忆条目的用户数
    pub async fn active_users(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn list_users(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}
