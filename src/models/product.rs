//! 产品数据结构
//!
//! 三类记录对应采集的三个层次：
//! - `WorkItem`: 后端下发的待采集任务（一个搜索词）
//! - `Candidate`: 搜索结果页上提取到的单条商品卡片，挂在一个 WorkItem 下
//! - `DetailRecord`: 通过验收判定的 Candidate + 详情页字段的合并结果

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 详情页图片数量上限（避免缩略图轮播把记录撑爆）
pub const MAX_DETAIL_IMAGES: usize = 10;

/// 待采集任务，由后端 API 下发
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<String>,
}

/// 搜索结果页提取的商品卡片
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub product_url: Option<String>,
    #[serde(default)]
    pub min_order: Option<String>,
    /// 归属的原始任务 ID（提取后由编排器打标）
    #[serde(default)]
    pub original_product_id: i64,
    #[serde(default)]
    pub category_id: Option<String>,
}

impl Candidate {
    /// 卡片至少要有描述或价格才算有效
    pub fn is_valid(&self) -> bool {
        self.description.is_some() || self.price.is_some()
    }

    /// 是否带有可用的详情页链接
    pub fn has_usable_url(&self) -> bool {
        self.product_url
            .as_deref()
            .map(|u| u.starts_with("http"))
            .unwrap_or(false)
    }
}

/// 阶梯价格的一档
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTier {
    pub quantity: String,
    pub price: String,
}

/// 详情页供应商信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplierInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub supplier_type: Option<String>,
    #[serde(default)]
    pub years_on_alibaba: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub performance: BTreeMap<String, String>,
}

/// 详情页提取出的全部字段
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailFields {
    #[serde(default)]
    pub prices: Vec<PriceTier>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub packaging_info: BTreeMap<String, String>,
    #[serde(default)]
    pub delivery_lead_times: BTreeMap<String, String>,
    #[serde(default)]
    pub detailed_description_text: Option<String>,
    #[serde(default)]
    pub detailed_description_html: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub supplier_info: Option<SupplierInfo>,
}

impl DetailFields {
    /// 验收判定：属性非空，或有描述文本，或有图片
    ///
    /// 不通过的候选直接丢弃，绝不落盘
    pub fn is_acceptable(&self) -> bool {
        !self.attributes.is_empty()
            || self
                .detailed_description_text
                .as_deref()
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false)
            || !self.images.is_empty()
    }
}

/// 通过验收的完整产品记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailRecord {
    #[serde(flatten)]
    pub candidate: Candidate,
    #[serde(flatten)]
    pub details: DetailFields,
    /// 详情页实际地址（可能经过跳转，与卡片链接不同）
    #[serde(default)]
    pub alibaba_detail_url: Option<String>,
}

impl DetailRecord {
    /// 合并候选与详情字段，图片列表截断到上限
    pub fn merge(candidate: Candidate, mut details: DetailFields, detail_url: Option<String>) -> Self {
        details.images.truncate(MAX_DETAIL_IMAGES);
        Self {
            candidate,
            details,
            alibaba_detail_url: detail_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_fields() -> DetailFields {
        DetailFields::default()
    }

    #[test]
    fn test_acceptance_rejects_empty_details() {
        assert!(!empty_fields().is_acceptable());
    }

    #[test]
    fn test_acceptance_whitespace_description_not_enough() {
        let mut f = empty_fields();
        f.detailed_description_text = Some("   ".to_string());
        assert!(!f.is_acceptable());
    }

    #[test]
    fn test_acceptance_any_single_signal_is_enough() {
        let mut with_attrs = empty_fields();
        with_attrs
            .attributes
            .insert("Material".to_string(), "Steel".to_string());
        assert!(with_attrs.is_acceptable());

        let mut with_desc = empty_fields();
        with_desc.detailed_description_text = Some("heavy duty widget".to_string());
        assert!(with_desc.is_acceptable());

        let mut with_imgs = empty_fields();
        with_imgs.images.push("https://example.com/a.jpg".to_string());
        assert!(with_imgs.is_acceptable());
    }

    #[test]
    fn test_merge_caps_image_count() {
        let candidate = Candidate {
            img: None,
            description: Some("widget".to_string()),
            price: None,
            company: None,
            product_url: Some("https://www.alibaba.com/product-detail/x.html".to_string()),
            min_order: None,
            original_product_id: 7,
            category_id: None,
        };
        let mut details = empty_fields();
        details.images = (0..25).map(|i| format!("https://img/{i}.jpg")).collect();

        let record = DetailRecord::merge(candidate, details, None);
        assert_eq!(record.details.images.len(), MAX_DETAIL_IMAGES);
    }

    #[test]
    fn test_usable_url() {
        let mut c = Candidate {
            img: None,
            description: None,
            price: None,
            company: None,
            product_url: None,
            min_order: None,
            original_product_id: 1,
            category_id: None,
        };
        assert!(!c.has_usable_url());
        c.product_url = Some("N/A".to_string());
        assert!(!c.has_usable_url());
        c.product_url = Some("https://www.alibaba.com/product-detail/1.html".to_string());
        assert!(c.has_usable_url());
    }
}
