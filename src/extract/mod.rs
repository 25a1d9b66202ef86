//! 数据提取层
//!
//! 编排核心从不直接接触页面结构：所有选择器和取值逻辑都隔离在
//! `Extractor` 接口之后，站点实现可整体替换。

pub mod alibaba;

use crate::error::Result;
use crate::infrastructure::JsExecutor;
use crate::models::{Candidate, DetailFields};
use async_trait::async_trait;

/// 提取协作者接口
#[async_trait]
pub trait Extractor: Send + Sync {
    /// 搜索结果页渲染完成的标志选择器
    fn listing_selector(&self) -> &'static str;

    /// 从当前搜索结果页提取商品卡片
    async fn extract_listing(&self, executor: &JsExecutor) -> Result<Vec<Candidate>>;

    /// 从当前详情页提取全部详情字段
    async fn extract_detail(&self, executor: &JsExecutor) -> Result<DetailFields>;
}

pub use alibaba::AlibabaExtractor;
