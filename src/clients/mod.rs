//! 外部服务客户端层
//!
//! ## 职责
//! - 从后台 API 拉取待抓取任务
//! - 回报完成状态（批量优先，失败时逐条兜底）
//! - 上传带详情的商品数据

pub mod catalog_api;

pub use catalog_api::{report_completions, CatalogApi, CompletionSink};
