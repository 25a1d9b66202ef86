//! 采集流水线 - 编排层
//!
//! 一次运行分四个阶段顺序推进：
//!
//! 1. 搜索：每个任务词构造搜索页地址，翻页提取商品卡片
//! 2. 详情：逐条访问候选详情页，提取字段并做验收判定
//! 3. 落盘：通过验收的记录写 CSV / JSON / 图片清单
//! 4. 回报：向后端标记有产出的任务为已完成
//!
//! 验证码在导航层内联处理，破解失败只跳过当前页面，不中断整次运行。

use crate::browser::Session;
use crate::captcha::CaptchaResolver;
use crate::clients::{report_completions, CatalogApi};
use crate::config::Config;
use crate::error::Result;
use crate::extract::Extractor;
use crate::infrastructure::JsExecutor;
use crate::models::{Candidate, DetailRecord, ExecutionState, Phase, RunSummary, WorkItem};
use crate::navigation::RetryingNavigator;
use crate::notify::Notifier;
use crate::persistence::ResultWriter;
use crate::utils::{logging, timing, CancelToken};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

/// 搜索页地址：关键词空格替换为加号
pub fn build_search_url(keywords: &str, page: usize) -> String {
    let encoded = keywords.trim().replace(' ', "+");
    let mut url = format!(
        "https://www.alibaba.com/trade/search?fsb=y&IndexArea=product_en&keywords={}",
        encoded
    );
    if page > 1 {
        url.push_str(&format!("&page={}", page));
    }
    url
}

/// 四阶段采集编排器
pub struct HarvestOrchestrator<E> {
    config: Config,
    extractor: E,
    notifier: Arc<dyn Notifier>,
    api: Arc<CatalogApi>,
}

impl<E> HarvestOrchestrator<E>
where
    E: Extractor + Clone + 'static,
{
    pub fn new(
        config: Config,
        extractor: E,
        notifier: Arc<dyn Notifier>,
        api: Arc<CatalogApi>,
    ) -> Self {
        Self {
            config,
            extractor,
            notifier,
            api,
        }
    }

    /// 跑完整的四阶段流水线
    pub async fn run(
        &self,
        executor: &JsExecutor,
        work_items: Vec<WorkItem>,
        cancel: &CancelToken,
    ) -> Result<RunSummary> {
        let started = Instant::now();
        let requested = work_items.len();
        let mut state = ExecutionState::new();

        info!("🔍 阶段 1/4: 搜索 ({} 个任务)", requested);
        state.phase = Phase::Search;
        let candidates = if self.config.parallel_sessions > 1 {
            self.search_phase_parallel(&work_items, &mut state, cancel)
                .await?
        } else {
            self.search_phase(executor, &work_items, &mut state, cancel)
                .await?
        };
        info!("✓ 搜索完成，共 {} 条候选", candidates.len());

        info!("📄 阶段 2/4: 详情提取 ({} 条候选)", candidates.len());
        state.phase = Phase::Detail;
        let records = self
            .detail_phase(executor, &candidates, &mut state, cancel)
            .await?;
        state.finalize_detail_phase();
        info!("✓ 详情提取完成，{} 条通过验收", records.len());

        info!("💾 阶段 3/4: 结果落盘");
        state.phase = Phase::Persist;
        ResultWriter::new(&self.config).write_all(&records)?;

        info!("📡 阶段 4/4: 完成状态回报");
        state.phase = Phase::Report;
        let contributing = state.contributing_ids();
        let confirmed = report_completions(self.api.as_ref(), &contributing).await;
        for id in confirmed {
            state.mark_completed(id);
        }

        state.phase = Phase::Done;
        let summary = RunSummary {
            requested,
            found: state.found_count,
            detailed: state.detailed_count,
            completed: state.completed_ids().len(),
            failed: state.failed_ids().len(),
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        info!(
            "🏁 运行结束: 任务 {} / 候选 {} / 验收 {} / 完成 {} / 失败 {} ({:.1}s)",
            summary.requested,
            summary.found,
            summary.detailed,
            summary.completed,
            summary.failed,
            summary.elapsed_secs
        );
        Ok(summary)
    }

    /// 搜索阶段：顺序处理每个任务词
    async fn search_phase(
        &self,
        executor: &JsExecutor,
        work_items: &[WorkItem],
        state: &mut ExecutionState,
        cancel: &CancelToken,
    ) -> Result<Vec<Candidate>> {
        let resolver = CaptchaResolver::new(&self.config, self.notifier.clone());
        let mut all = Vec::new();

        for (index, item) in work_items.iter().enumerate() {
            cancel.ensure_active()?;
            info!(
                "🔎 [{}/{}] 搜索: {} (任务 {})",
                index + 1,
                work_items.len(),
                item.name,
                item.id
            );

            let found = self
                .search_one(executor, &resolver, item, cancel)
                .await?;
            state.record_search_found(item.id, found.len());
            if found.is_empty() {
                warn!("✗ 任务 {} 未找到任何候选", item.id);
                state.record_search_failed(item.id);
            }
            all.extend(found);

            if index + 1 < work_items.len() {
                timing::pause(timing::BETWEEN_REQUESTS, cancel).await?;
            }
        }

        Ok(all)
    }

    /// 单个任务词的搜索（含重试与翻页），绝不向上传播非取消错误
    async fn search_one(
        &self,
        executor: &JsExecutor,
        resolver: &CaptchaResolver,
        item: &WorkItem,
        cancel: &CancelToken,
    ) -> Result<Vec<Candidate>> {
        let navigator = RetryingNavigator::new(resolver, self.config.max_page_retries);

        for attempt in 1..=self.config.max_search_retries {
            cancel.ensure_active()?;
            let mut found = Vec::new();

            for page in 1..=self.config.max_search_pages {
                let url = build_search_url(&item.name, page);
                let loaded = navigator.load(executor, &url, cancel).await?;
                if !loaded {
                    warn!("页面加载失败，跳过第 {} 页", page);
                    break;
                }

                // 卡片靠滚动触发懒加载
                executor
                    .wait_for_presence(self.extractor.listing_selector(), 10)
                    .await?;
                executor.smart_scroll().await?;

                match self.extractor.extract_listing(executor).await {
                    Ok(page_candidates) => {
                        if page_candidates.is_empty() {
                            debug!("第 {} 页没有卡片，停止翻页", page);
                            break;
                        }
                        found.extend(page_candidates);
                    }
                    Err(e) => {
                        warn!("第 {} 页提取失败: {}", page, e);
                        break;
                    }
                }

                if page < self.config.max_search_pages {
                    timing::pause(timing::BETWEEN_REQUESTS, cancel).await?;
                }
            }

            if !found.is_empty() {
                for candidate in &mut found {
                    candidate.original_product_id = item.id;
                    candidate.category_id = item.category_id.clone();
                }
                info!("✓ 任务 {} 找到 {} 条候选", item.id, found.len());
                return Ok(found);
            }

            warn!(
                "任务 {} 第 {}/{} 次搜索无结果",
                item.id, attempt, self.config.max_search_retries
            );
            if attempt < self.config.max_search_retries {
                timing::pause(timing::RETRY_WAIT, cancel).await?;
            }
        }

        Ok(Vec::new())
    }

    /// 并行搜索：每个工作者启动独立会话，信号量限制并发
    async fn search_phase_parallel(
        &self,
        work_items: &[WorkItem],
        state: &mut ExecutionState,
        cancel: &CancelToken,
    ) -> Result<Vec<Candidate>> {
        let semaphore = Arc::new(Semaphore::new(self.config.parallel_sessions));
        let results: Arc<Mutex<Vec<(i64, Vec<Candidate>)>>> = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();

        info!(
            "⚡ 并行搜索: {} 个任务, 并发 {}",
            work_items.len(),
            self.config.parallel_sessions
        );

        for item in work_items.iter().cloned() {
            let semaphore = semaphore.clone();
            let results = results.clone();
            let cancel = cancel.clone();
            let config = self.config.clone();
            let extractor = self.extractor.clone();
            let notifier = self.notifier.clone();
            let orchestrator = HarvestOrchestrator {
                config: config.clone(),
                extractor,
                notifier,
                api: self.api.clone(),
            };

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                if cancel.is_cancelled() {
                    return;
                }

                let session = match Session::launch(&config).await {
                    Ok(session) => session,
                    Err(e) => {
                        warn!("并行会话启动失败，任务 {} 落空: {}", item.id, e);
                        results.lock().await.push((item.id, Vec::new()));
                        return;
                    }
                };

                let executor = JsExecutor::new(session.page().clone());
                let resolver =
                    CaptchaResolver::new(&orchestrator.config, orchestrator.notifier.clone());
                let outcome = orchestrator
                    .search_one(&executor, &resolver, &item, &cancel)
                    .await;
                session.close().await;

                match outcome {
                    Ok(found) => results.lock().await.push((item.id, found)),
                    Err(e) => {
                        if !e.is_cancelled() {
                            warn!("并行搜索任务 {} 出错: {}", item.id, e);
                        }
                        results.lock().await.push((item.id, Vec::new()));
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
        cancel.ensure_active()?;

        let mut all = Vec::new();
        for (id, found) in results.lock().await.drain(..) {
            state.record_search_found(id, found.len());
            if found.is_empty() {
                state.record_search_failed(id);
            }
            all.extend(found);
        }
        Ok(all)
    }

    /// 详情阶段：逐条访问候选详情页
    async fn detail_phase(
        &self,
        executor: &JsExecutor,
        candidates: &[Candidate],
        state: &mut ExecutionState,
        cancel: &CancelToken,
    ) -> Result<Vec<DetailRecord>> {
        let resolver = CaptchaResolver::new(&self.config, self.notifier.clone());
        let navigator = RetryingNavigator::new(&resolver, self.config.max_page_retries);
        let mut records = Vec::new();

        for (index, candidate) in candidates.iter().enumerate() {
            cancel.ensure_active()?;

            let url = match candidate.product_url.as_deref() {
                Some(url) if candidate.has_usable_url() => url,
                _ => {
                    debug!("候选无可用详情链接，跳过");
                    continue;
                }
            };
            info!(
                "📄 [{}/{}] 详情: {}",
                index + 1,
                candidates.len(),
                logging::truncate_text(candidate.description.as_deref().unwrap_or("(无标题)"), 60)
            );

            if let Some(record) = self
                .detail_one(executor, &navigator, candidate, url, cancel)
                .await?
            {
                state.record_accepted_detail(record.candidate.original_product_id);

                // 有完整描述的记录即时单条上传，落盘失败也不丢数据
                if record.details.detailed_description_text.is_some() {
                    self.api.submit_single_product(&record).await;
                }
                records.push(record);
            }

            if index + 1 < candidates.len() {
                timing::pause(timing::BETWEEN_PRODUCTS, cancel).await?;
            }
        }

        Ok(records)
    }

    /// 单条候选的详情提取（含重试与验收判定）
    async fn detail_one(
        &self,
        executor: &JsExecutor,
        navigator: &RetryingNavigator<'_>,
        candidate: &Candidate,
        url: &str,
        cancel: &CancelToken,
    ) -> Result<Option<DetailRecord>> {
        for attempt in 1..=self.config.max_detail_retries {
            cancel.ensure_active()?;

            let loaded = navigator.load(executor, url, cancel).await?;
            if loaded {
                // 详情页字段大量懒加载，先滚完再提取
                executor.smart_scroll().await?;
                timing::settle(timing::SETTLE_SECS, cancel).await?;

                match self.extractor.extract_detail(executor).await {
                    Ok(details) if details.is_acceptable() => {
                        let detail_url = executor.current_url().await?;
                        let record = DetailRecord::merge(candidate.clone(), details, detail_url);
                        info!(
                            "✓ 验收通过: {} 项属性, {} 张图片",
                            record.details.attributes.len(),
                            record.details.images.len()
                        );
                        return Ok(Some(record));
                    }
                    Ok(_) => {
                        warn!(
                            "详情字段未通过验收 (尝试 {}/{})",
                            attempt, self.config.max_detail_retries
                        );
                    }
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => {
                        warn!("详情提取出错 (尝试 {}): {}", attempt, e);
                    }
                }
            } else {
                warn!(
                    "详情页加载失败 (尝试 {}/{})",
                    attempt, self.config.max_detail_retries
                );
            }

            // 加载失败的尝试同样要退避，避免对同一地址连轰
            timing::backoff_between_attempts(attempt, self.config.max_detail_retries, cancel)
                .await?;
        }

        info!("✗ 候选在 {} 次尝试后被丢弃", self.config.max_detail_retries);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_encodes_spaces() {
        assert_eq!(
            build_search_url("solar panel kit", 1),
            "https://www.alibaba.com/trade/search?fsb=y&IndexArea=product_en&keywords=solar+panel+kit"
        );
    }

    #[test]
    fn test_search_url_page_param_only_beyond_first() {
        assert!(!build_search_url("widget", 1).contains("&page="));
        assert!(build_search_url("widget", 3).ends_with("&page=3"));
    }

    #[test]
    fn test_search_url_trims_keywords() {
        assert!(build_search_url("  widget  ", 1).ends_with("keywords=widget"));
    }
}
