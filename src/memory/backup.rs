//! 记忆备份
//!
//! 每次压缩成功后把新记忆写成一个带时间戳的文本文件，仅作审计，运行中从不回读。
//! 文件名：`<dir>/<prefix><UTC 时间戳>.txt`，时间戳为去掉标点的 ISO-8601（精确到毫秒），如 `20250312T081530123Z`。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::core::BotError;

pub const DEFAULT_BACKUP_PREFIX: &str = "backup_";

/// 备份写入器
#[async_trait]
pub trait BackupWriter: Send + Sync {
    /// 写入一份快照，返回文件路径
    async fn write(&self, memory_text: &str) -> Result<PathBuf, BotError>;
}

/// 紧凑 UTC 时间戳：ISO-8601 去掉 `-` `:` `.`
pub fn compact_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

/// 文件备份：目录不存在时自动创建
#[derive(Debug, Clone)]
pub struct FileBackupWriter {
    dir: PathBuf,
    prefix: String,
}

impl FileBackupWriter {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            prefix: DEFAULT_BACKUP_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn path_for(&self, at: DateTime<Utc>) -> PathBuf {
        self.dir
            .join(format!("{}{}.txt", self.prefix, compact_timestamp(at)))
    }

    /// 同一毫秒内的多次写入追加 `_1`、`_2`…，已有快照永不覆盖
    async fn create_unique(&self, at: DateTime<Utc>) -> std::io::Result<(PathBuf, tokio::fs::File)> {
        let stamp = compact_timestamp(at);
        let mut n = 0usize;
        loop {
            let path = if n == 0 {
                self.path_for(at)
            } else {
                self.dir.join(format!("{}{}_{}.txt", self.prefix, stamp, n))
            };
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl BackupWriter for FileBackupWriter {
    async fn write(&self, memory_text: &str) -> Result<PathBuf, BotError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BotError::Backup(format!("{}: {}", self.dir.display(), e)))?;

        let (path, mut file) = self
            .create_unique(Utc::now())
            .await
            .map_err(|e| BotError::Backup(format!("{}: {}", self.dir.display(), e)))?;
        file.write_all(memory_text.as_bytes())
            .await
            .map_err(|e| BotError::Backup(format!("{}: {}", path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| BotError::Backup(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }
}

/// 不写任何东西（测试或关闭备份时使用）
#[derive(Debug, Default)]
pub struct NoopBackupWriter;

#[async_trait]
impl BackupWriter for NoopBackupWriter {
    async fn write(&self, _memory_text: &str) -> Result<PathBuf, BotError> {
        Ok(PathBuf::new())
    }
}
