//! 后台目录 API 客户端
//!
//! 所有请求走 JSON，单个商品上传失败不影响整体流程，
//! 完成回报失败则降级为逐条重试。

use crate::config::Config;
use crate::error::{Result, ScrapeError};
use crate::models::{DetailRecord, WorkItem};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info, warn};

/// 完成状态回报的抽象，便于在测试中替换网络实现
#[async_trait]
pub trait CompletionSink: Send + Sync {
    /// 批量标记完成，整批成功返回 Ok
    async fn mark_completed_batch(&self, ids: &[i64]) -> Result<()>;

    /// 单条标记完成
    async fn mark_completed_single(&self, id: i64) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct WorkItemsResponse {
    products: Vec<WorkItem>,
}

/// 目录后台 API 客户端
pub struct CatalogApi {
    client: reqwest::Client,
    config: Config,
}

impl CatalogApi {
    pub fn new(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ScrapeError::Other(format!("HTTP 客户端构建失败: {}", e)))?;
        Ok(Self { client, config })
    }

    /// 拉取待抓取任务列表
    pub async fn fetch_work_items(&self) -> Result<Vec<WorkItem>> {
        let url = self.config.get_products_url();
        info!("📥 拉取待抓取任务: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ScrapeError::api(&url, e))?
            .error_for_status()
            .map_err(|e| ScrapeError::api(&url, e))?;

        let body: WorkItemsResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::api(&url, e))?;

        info!("📋 共 {} 个待抓取任务", body.products.len());
        Ok(body.products)
    }

    /// 上传单个带详情的商品，仅在描述文本存在时调用
    ///
    /// 上传失败只记录日志，不中断抓取流程。
    pub async fn submit_single_product(&self, record: &DetailRecord) {
        let url = self.config.send_products_url();

        let result = async {
            self.client
                .post(&url)
                .json(record)
                .send()
                .await
                .map_err(|e| ScrapeError::api(&url, e))?
                .error_for_status()
                .map_err(|e| ScrapeError::api(&url, e))?;
            Ok::<(), ScrapeError>(())
        }
        .await;

        match result {
            Ok(()) => info!("📤 商品上传成功 (来源任务 {})", record.candidate.original_product_id),
            Err(e) => warn!("⚠️ 商品上传失败，跳过: {}", e),
        }
    }
}

#[async_trait]
impl CompletionSink for CatalogApi {
    async fn mark_completed_batch(&self, ids: &[i64]) -> Result<()> {
        let url = self.config.mark_completed_url();
        self.client
            .post(&url)
            .json(&json!({ "product_ids": ids }))
            .send()
            .await
            .map_err(|e| ScrapeError::api(&url, e))?
            .error_for_status()
            .map_err(|e| ScrapeError::api(&url, e))?;
        Ok(())
    }

    async fn mark_completed_single(&self, id: i64) -> Result<()> {
        let url = self.config.mark_completed_url();
        self.client
            .post(&url)
            .json(&json!({ "product_ids": [id] }))
            .send()
            .await
            .map_err(|e| ScrapeError::api(&url, e))?
            .error_for_status()
            .map_err(|e| ScrapeError::api(&url, e))?;
        Ok(())
    }
}

/// 回报完成状态：批量优先，失败时逐条兜底
///
/// 返回后端实际确认完成的任务 ID，永远是请求 ID 的子集。
pub async fn report_completions<S: CompletionSink + ?Sized>(sink: &S, ids: &[i64]) -> Vec<i64> {
    if ids.is_empty() {
        return Vec::new();
    }

    match sink.mark_completed_batch(ids).await {
        Ok(()) => {
            info!("✅ 批量标记完成成功 ({} 条)", ids.len());
            ids.to_vec()
        }
        Err(e) => {
            warn!("⚠️ 批量标记失败，降级为逐条重试: {}", e);
            let mut confirmed = Vec::new();
            for &id in ids {
                match sink.mark_completed_single(id).await {
                    Ok(()) => confirmed.push(id),
                    Err(e) => error!("❌ 任务 {} 标记完成失败: {}", id, e),
                }
            }
            info!("✅ 逐条标记完成: {}/{}", confirmed.len(), ids.len());
            confirmed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockSink {
        batch_fails: bool,
        single_fail_ids: Vec<i64>,
        batch_calls: AtomicUsize,
        single_calls: Mutex<Vec<i64>>,
    }

    impl MockSink {
        fn new(batch_fails: bool, single_fail_ids: Vec<i64>) -> Self {
            Self {
                batch_fails,
                single_fail_ids,
                batch_calls: AtomicUsize::new(0),
                single_calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionSink for MockSink {
        async fn mark_completed_batch(&self, _ids: &[i64]) -> Result<()> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            if self.batch_fails {
                Err(ScrapeError::Other("批量接口不可用".to_string()))
            } else {
                Ok(())
            }
        }

        async fn mark_completed_single(&self, id: i64) -> Result<()> {
            self.single_calls.lock().unwrap().push(id);
            if self.single_fail_ids.contains(&id) {
                Err(ScrapeError::Other(format!("任务 {} 标记失败", id)))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_batch_success_skips_singles() {
        let sink = MockSink::new(false, vec![]);
        let confirmed = report_completions(&sink, &[1, 2, 3]).await;
        assert_eq!(confirmed, vec![1, 2, 3]);
        assert_eq!(sink.batch_calls.load(Ordering::SeqCst), 1);
        assert!(sink.single_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_failure_falls_back_per_id() {
        let sink = MockSink::new(true, vec![]);
        let confirmed = report_completions(&sink, &[10, 20]).await;
        assert_eq!(confirmed, vec![10, 20]);
        assert_eq!(*sink.single_calls.lock().unwrap(), vec![10, 20]);
    }

    #[tokio::test]
    async fn test_partial_single_failures_excluded() {
        let sink = MockSink::new(true, vec![20]);
        let confirmed = report_completions(&sink, &[10, 20, 30]).await;
        assert_eq!(confirmed, vec![10, 30]);
    }

    #[test]
    fn test_client_construction_propagates_result() {
        let api = CatalogApi::new(crate::config::Config::default());
        assert!(api.is_ok());
    }

    #[tokio::test]
    async fn test_empty_ids_no_calls() {
        let sink = MockSink::new(false, vec![]);
        let confirmed = report_completions(&sink, &[]).await;
        assert!(confirmed.is_empty());
        assert_eq!(sink.batch_calls.load(Ordering::SeqCst), 0);
    }
}
