//! 取消信号
//!
//! 用户中断（Ctrl-C）后，所有阻塞等待都必须能在两次操作之间观察到取消，
//! 并触发会话的作用域清理。取消后不再有任何重试。

use crate::error::{Result, ScrapeError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// 可克隆的取消令牌
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发取消，唤醒所有等待者
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// 检查点：已取消则返回 Cancelled 错误
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ScrapeError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// 等待直到取消被触发
    pub async fn cancelled(&self) {
        loop {
            // 先注册等待再检查标志，避免错过唤醒
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_active_after_cancel() {
        let token = CancelToken::new();
        assert!(token.ensure_active().is_ok());

        token.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(
            token.ensure_active(),
            Err(ScrapeError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_if_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancelled().await;
    }
}
