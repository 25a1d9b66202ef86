//! 执行监督器 - 最外层重试环
//!
//! ## 职责
//! - 拉取任务列表，空列表直接视为成功
//! - 为每轮执行启动并保证关闭浏览器会话（所有退出路径）
//! - 整轮失败时退避重试，耗尽后发致命通知
//! - 取消信号立即中止，不再重试

use crate::browser::Session;
use crate::clients::CatalogApi;
use crate::config::Config;
use crate::error::{Result, ScrapeError};
use crate::extract::Extractor;
use crate::infrastructure::JsExecutor;
use crate::models::RunSummary;
use crate::notify::{Event, Notifier};
use crate::orchestrator::HarvestOrchestrator;
use crate::utils::{timing, CancelToken};
use std::sync::Arc;
use tracing::{error, info, warn};

/// 执行监督器
pub struct ExecutionSupervisor<E> {
    config: Config,
    extractor: E,
    notifier: Arc<dyn Notifier>,
}

impl<E> ExecutionSupervisor<E>
where
    E: Extractor + Clone + 'static,
{
    pub fn new(config: Config, extractor: E, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config,
            extractor,
            notifier,
        }
    }

    /// 带整体重试的执行入口
    pub async fn run(&self, cancel: &CancelToken) -> Result<RunSummary> {
        let max = self.config.max_execution_retries;

        for attempt in 1..=max {
            cancel.ensure_active()?;
            info!("🚦 整体执行 第 {}/{} 轮", attempt, max);

            match self.run_once(cancel).await {
                Ok(summary) => {
                    self.notifier.notify(
                        Event::RunSuccess,
                        &format!(
                            "采集完成: {} 条验收记录, {} 个任务完成",
                            summary.detailed, summary.completed
                        ),
                    );
                    return Ok(summary);
                }
                Err(e) if e.is_cancelled() => {
                    warn!("收到取消信号，中止执行");
                    return Err(e);
                }
                Err(e) => {
                    error!("❌ 第 {} 轮执行失败: {}", attempt, e);
                    if attempt < max {
                        timing::pause(timing::EXECUTION_RETRY_WAIT, cancel).await?;
                    }
                }
            }
        }

        self.notifier.notify(
            Event::RunError,
            &format!("采集在 {} 轮整体重试后仍然失败", max),
        );
        Err(ScrapeError::ExecutionExhausted { attempts: max })
    }

    /// 单轮执行：拉任务 → 启动会话 → 跑流水线 → 关闭会话
    async fn run_once(&self, cancel: &CancelToken) -> Result<RunSummary> {
        let api = Arc::new(CatalogApi::new(self.config.clone())?);

        let work_items = api.fetch_work_items().await?;
        if work_items.is_empty() {
            info!("📭 没有待抓取任务，本轮直接结束");
            return Ok(RunSummary {
                requested: 0,
                found: 0,
                detailed: 0,
                completed: 0,
                failed: 0,
                elapsed_secs: 0.0,
            });
        }

        let session = Session::launch(&self.config).await?;
        let executor = JsExecutor::new(session.page().clone());

        let orchestrator = HarvestOrchestrator::new(
            self.config.clone(),
            self.extractor.clone(),
            self.notifier.clone(),
            api,
        );
        let outcome = orchestrator.run(&executor, work_items, cancel).await;

        // 无论流水线成败都要释放会话
        session.close().await;
        outcome
    }
}
