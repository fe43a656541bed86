//! 记忆层：按用户的压缩记忆存储、压缩器、审计备份

pub mod backup;
pub mod compressor;
pub mod store;

pub use backup::{compact_timestamp, BackupWriter, FileBackupWriter, NoopBackupWriter};
pub use compressor::{MemoryCompressor, COMPRESSION_INSTRUCTION};
pub use store::{MemoryStore, MemorySlot};
