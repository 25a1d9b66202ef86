//! 带重试的页面导航
//!
//! 每次加载：导航 → 固定沉降等待 → 地址检查（排除错误页）→ 委托验证码
//! 状态机。失败抖动退避后重试；重试耗尽返回 `Ok(false)` 而不是错误，
//! 由调用方决定是否跳过该页面。

use crate::captcha::CaptchaResolver;
use crate::error::Result;
use crate::infrastructure::JsExecutor;
use crate::utils::{timing, CancelToken};
use tracing::{debug, info, warn};

/// 带重试的导航器
pub struct RetryingNavigator<'a> {
    resolver: &'a CaptchaResolver,
    max_attempts: usize,
}

impl<'a> RetryingNavigator<'a> {
    pub fn new(resolver: &'a CaptchaResolver, max_attempts: usize) -> Self {
        Self {
            resolver,
            max_attempts,
        }
    }

    /// 加载 URL，成功返回 `Ok(true)`，重试耗尽返回 `Ok(false)`
    pub async fn load(
        &self,
        executor: &JsExecutor,
        url: &str,
        cancel: &CancelToken,
    ) -> Result<bool> {
        for attempt in 1..=self.max_attempts {
            cancel.ensure_active()?;
            debug!("加载页面... 尝试 {}/{}: {}", attempt, self.max_attempts, url);

            match self.try_load(executor, url, cancel).await {
                Ok(true) => {
                    debug!("✓ 页面加载成功");
                    return Ok(true);
                }
                Ok(false) => {
                    warn!("页面未正确加载，准备重试");
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!("第 {} 次加载出错: {}", attempt, e);
                }
            }

            if attempt < self.max_attempts {
                timing::pause(timing::RETRY_WAIT, cancel).await?;
            }
        }

        info!("✗ 页面在 {} 次尝试后仍未加载成功: {}", self.max_attempts, url);
        Ok(false)
    }

    async fn try_load(
        &self,
        executor: &JsExecutor,
        url: &str,
        cancel: &CancelToken,
    ) -> Result<bool> {
        executor.navigate(url).await?;
        timing::settle(timing::PAGE_LOAD_SECS, cancel).await?;

        let current = executor.current_url().await?.unwrap_or_default();
        if current.is_empty() || looks_like_error_page(&current) {
            return Ok(false);
        }

        let resolution = self.resolver.resolve(executor, cancel).await?;
        Ok(resolution.is_usable())
    }
}

/// 错误页启发式：地址里带 "error" 就视为加载失败
fn looks_like_error_page(url: &str) -> bool {
    url.to_lowercase().contains("error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_page_heuristic() {
        assert!(looks_like_error_page(
            "https://www.alibaba.com/error?code=403"
        ));
        assert!(looks_like_error_page("https://x.com/ERROR_PAGE"));
        assert!(!looks_like_error_page(
            "https://www.alibaba.com/trade/search?keywords=widget"
        ));
    }
}
