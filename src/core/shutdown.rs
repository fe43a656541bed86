//! 关闭信号处理
//!
//! Ctrl+C 触发 CancellationToken，Discord 事件循环据此退出；进行中的消息任务自然结束。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// 关闭信号管理器
#[derive(Clone, Default)]
pub struct ShutdownManager {
    shutdown_token: CancellationToken,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取关闭 token（用于取消事件循环）
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }

    /// 安装 Ctrl+C 处理器
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, shutting down...");
                manager.shutdown();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_cancels_token() {
        let manager = ShutdownManager::new();
        let token = manager.token();
        assert!(!token.is_cancelled());

        manager.shutdown();
        token.cancelled().await;
        assert!(manager.token().is_cancelled());
    }
}
