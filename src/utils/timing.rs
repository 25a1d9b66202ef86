//! 等待与节流
//!
//! 所有固定等待和抖动退避集中在这里，等待期间始终可观察取消信号。

use crate::error::Result;
use crate::utils::CancelToken;
use rand::Rng;
use std::time::Duration;

/// 页面加载后的固定等待（秒）
pub const PAGE_LOAD_SECS: u64 = 2;
/// 状态变更动作后的固定等待（秒）
pub const SETTLE_SECS: u64 = 2;
/// 两次请求之间的间隔范围（秒）
pub const BETWEEN_REQUESTS: (f64, f64) = (1.0, 2.0);
/// 两个产品之间的间隔范围（秒）
pub const BETWEEN_PRODUCTS: (f64, f64) = (2.0, 3.0);
/// 失败重试前的退避范围（秒）
pub const RETRY_WAIT: (f64, f64) = (2.0, 4.0);
/// 整体执行重试前的退避范围（秒）
pub const EXECUTION_RETRY_WAIT: (f64, f64) = (10.0, 20.0);

/// 在范围内取一个抖动时长
pub fn jittered(range: (f64, f64)) -> Duration {
    let secs = rand::thread_rng().gen_range(range.0..range.1);
    Duration::from_secs_f64(secs)
}

/// 固定秒数等待，可被取消打断
pub async fn settle(secs: u64, cancel: &CancelToken) -> Result<()> {
    wait(Duration::from_secs(secs), cancel).await
}

/// 抖动等待，可被取消打断
pub async fn pause(range: (f64, f64), cancel: &CancelToken) -> Result<()> {
    wait(jittered(range), cancel).await
}

/// 两次失败尝试之间的抖动退避；最后一次尝试后不再等待
pub async fn backoff_between_attempts(
    attempt: usize,
    max_attempts: usize,
    cancel: &CancelToken,
) -> Result<()> {
    if attempt < max_attempts {
        pause(RETRY_WAIT, cancel).await?;
    }
    Ok(())
}

async fn wait(duration: Duration, cancel: &CancelToken) -> Result<()> {
    cancel.ensure_active()?;
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(crate::error::ScrapeError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jittered_within_range() {
        for _ in 0..100 {
            let d = jittered(RETRY_WAIT).as_secs_f64();
            assert!(d >= RETRY_WAIT.0 && d < RETRY_WAIT.1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let cancel = CancelToken::new();
        let before = tokio::time::Instant::now();
        backoff_between_attempts(1, 3, &cancel).await.unwrap();
        let waited = before.elapsed().as_secs_f64();
        assert!(waited >= RETRY_WAIT.0, "waited {}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_skipped_after_last_attempt() {
        let cancel = CancelToken::new();
        let before = tokio::time::Instant::now();
        backoff_between_attempts(3, 3, &cancel).await.unwrap();
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_pause_interrupted_by_cancel() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = pause((5.0, 6.0), &cancel).await;
        assert!(result.is_err());
    }
}
