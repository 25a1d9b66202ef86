//! Alibaba 站点提取实现
//!
//! 搜索结果页和详情页的字段都通过一段 JS 在页面内收集后整体返回，
//! 避免逐元素往返 CDP。图片地址在 Rust 侧做质量升级和协议补全。

use crate::error::Result;
use crate::extract::Extractor;
use crate::infrastructure::JsExecutor;
use crate::models::{Candidate, DetailFields};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

/// 搜索结果卡片选择器
pub const PRODUCT_ITEMS_SELECTOR: &str = ".m-gallery-product-item-v2";

/// Alibaba 提取器
#[derive(Clone)]
pub struct AlibabaExtractor {
    image_size_re: Regex,
}

impl AlibabaExtractor {
    pub fn new() -> Self {
        Self {
            // 形如 xxx_250x250.jpg 的缩略图地址升级为统一的 720p 质量
            image_size_re: Regex::new(r"_\d+x\d+[^/]*\.jpg").expect("内置正则必定合法"),
        }
    }

    /// 补全协议并升级图片质量
    fn normalize_image_url(&self, url: &str) -> String {
        let full = if url.starts_with("//") {
            format!("https:{}", url)
        } else {
            url.to_string()
        };
        self.image_size_re
            .replace(&full, "_720x720q50.jpg")
            .into_owned()
    }
}

impl Default for AlibabaExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for AlibabaExtractor {
    fn listing_selector(&self) -> &'static str {
        PRODUCT_ITEMS_SELECTOR
    }

    async fn extract_listing(&self, executor: &JsExecutor) -> Result<Vec<Candidate>> {
        let raw: Vec<Candidate> = executor.eval_as(LISTING_JS).await?;

        let mut candidates: Vec<Candidate> = raw.into_iter().filter(|c| c.is_valid()).collect();
        for candidate in &mut candidates {
            if let Some(img) = &candidate.img {
                candidate.img = Some(self.normalize_image_url(img));
            }
        }

        debug!("本页提取到 {} 条有效商品卡片", candidates.len());
        Ok(candidates)
    }

    async fn extract_detail(&self, executor: &JsExecutor) -> Result<DetailFields> {
        let mut details: DetailFields = executor.eval_as(DETAIL_JS).await?;

        // JS 端已去重，改写质量后可能再次出现重复
        let mut seen = std::collections::BTreeSet::new();
        details.images = details
            .images
            .iter()
            .map(|u| self.normalize_image_url(u))
            .filter(|u| seen.insert(u.clone()))
            .collect();

        if details.attributes.is_empty() && details.images.is_empty() {
            warn!("详情页字段稀少，可能未完全渲染");
        }

        Ok(details)
    }
}

/// 搜索结果页提取脚本
const LISTING_JS: &str = r#"
(() => {
    const pick = (root, sel) => {
        const n = root.querySelector(sel);
        const text = n ? n.textContent.trim() : '';
        return text ? text : null;
    };

    return Array.from(document.querySelectorAll('.m-gallery-product-item-v2')).map(el => {
        const data = {};

        const img = el.querySelector('.search-card-e-slider__img');
        data.img = img ? (img.src || img.dataset.src || null) : null;

        data.description = pick(el, '.search-card-e-title');
        data.price = pick(el, '.search-card-e-price-main');
        data.company = pick(el, '.search-card-e-company');
        data.min_order = pick(el, '.search-card-e-moq');

        const link = el.querySelector("a[href*='/product-detail/']") ||
                     el.querySelector('.search-card-e-title a');
        data.product_url = link ? link.href : null;

        return data;
    });
})()
"#;

/// 详情页提取脚本
const DETAIL_JS: &str = r#"
(() => {
    const details = {
        prices: [],
        attributes: {},
        packaging_info: {},
        delivery_lead_times: {},
        detailed_description_text: null,
        detailed_description_html: null,
        images: [],
        supplier_info: null
    };

    // ---- 价格：优先阶梯价，退回单一区间价 ----
    const ladder = document.querySelector('div[data-testid="ladder-price"]');
    if (ladder) {
        ladder.querySelectorAll('.price-item').forEach(item => {
            let quantity = '';
            item.querySelectorAll('div').forEach(div => {
                const classes = div.className || '';
                if (classes.includes('text-sm') && classes.includes('666') && !quantity) {
                    quantity = div.textContent.trim();
                }
            });
            const firstSpan = item.querySelector('span');
            const price = firstSpan ? firstSpan.textContent.trim() : '';
            if (!quantity) {
                const firstDiv = item.querySelector('div');
                quantity = firstDiv ? firstDiv.textContent.trim() : '';
            }
            if (quantity && price) {
                details.prices.push({ quantity: quantity, price: price });
            }
        });
    }
    if (details.prices.length === 0) {
        const single = document.querySelector('div[data-testid="range-price"]');
        if (single) {
            const firstDiv = single.querySelector('div');
            const firstSpan = single.querySelector('span');
            const quantity = firstDiv ? firstDiv.textContent.trim() : '';
            const price = firstSpan ? firstSpan.textContent.trim() : '';
            if (price) {
                details.prices.push({
                    quantity: quantity || 'MOQ not specified',
                    price: price
                });
            }
        }
    }

    // ---- 属性表（包装/物流小节单独归类）----
    const attrContainer = document.querySelector('div[data-testid="module-attribute"]');
    if (attrContainer) {
        const readRow = (row, target) => {
            const keyDiv = row.querySelector('div[class*="id-bg-[#f8f8f8]"]');
            const valueDiv = row.querySelector('div[class*="id-font-medium"]');
            if (!keyDiv || !valueDiv) return;
            const keyEl = keyDiv.querySelector('.id-line-clamp-2') || keyDiv;
            const valueEl = valueDiv.querySelector('.id-line-clamp-2') || valueDiv;
            const key = keyEl.textContent.trim();
            const value = valueEl.textContent.trim();
            if (key && value) target[key] = value;
        };

        let packagingHeading = null;
        attrContainer.querySelectorAll('h3').forEach(h => {
            const t = h.textContent.trim();
            if (t.includes('Packaging') || t.includes('delivery') || t.includes('entrega')) {
                packagingHeading = h;
            }
        });
        const packagingRoot = packagingHeading ? packagingHeading.closest('div') : null;

        attrContainer.querySelectorAll('div.id-grid').forEach(row => {
            if (packagingRoot && packagingRoot.contains(row)) {
                readRow(row, details.packaging_info);
            } else {
                readRow(row, details.attributes);
            }
        });
    }

    // ---- 交期表 ----
    const leadContainer = document.querySelector('div[data-module-name="module_lead"]');
    if (leadContainer) {
        const table = leadContainer.querySelector('table');
        const rows = table ? table.querySelectorAll('tr') : [];
        if (rows.length >= 2) {
            const headers = rows[0].querySelectorAll('td');
            const values = rows[1].querySelectorAll('td');
            for (let i = 1; i < headers.length && i < values.length; i++) {
                const range = headers[i].textContent.trim();
                const time = values[i].textContent.trim();
                if (range && time) details.delivery_lead_times[range] = time;
            }
        }
    }

    // ---- 描述 ----
    const descLayout = document.getElementById('description-layout') ||
                       document.querySelector('.description-layout');
    if (descLayout) {
        const text = descLayout.textContent.trim();
        details.detailed_description_text = text ? text : null;
        details.detailed_description_html = descLayout.outerHTML;
    }

    // ---- 图片：主图 + 轮播图 ----
    const pushImage = (url) => {
        if (!url || url.includes('data:') || url.includes('.gif')) return;
        if (!details.images.includes(url)) details.images.push(url);
    };

    document.querySelectorAll(
        'img[data-testid="media-image"], div[data-testid="media-image"] img'
    ).forEach(img => pushImage(img.src || img.getAttribute('src')));

    document.querySelectorAll([
        'div[data-module="MainImage"] img[src*="alicdn.com"]',
        'div.main-index img[src*="alicdn.com"]',
        'img[alt*="product"]',
        'video[poster]'
    ].join(',')).forEach(el => {
        const url = el.tagName === 'VIDEO'
            ? el.getAttribute('poster')
            : (el.src || el.getAttribute('src'));
        pushImage(url);
    });

    // ---- 供应商卡片 ----
    const supplierSection = document.querySelector(
        'div[data-module-name="module_unifed_company_card"]'
    );
    if (supplierSection) {
        const info = { performance: {} };

        const nameLink = supplierSection.querySelector('a[target="_blank"]');
        info.name = nameLink ? nameLink.textContent.trim() : null;

        const typeEl = supplierSection.querySelector('.id-text-xs');
        if (typeEl) {
            const spans = typeEl.querySelectorAll('span');
            info.type = spans[0] ? spans[0].textContent.trim() : null;
            info.years_on_alibaba = spans[1] ? spans[1].textContent.trim() : null;
        }

        const locEl = supplierSection.querySelector('.id-text-xs > img + span');
        info.location = locEl ? locEl.textContent.trim() : null;

        supplierSection.querySelectorAll('button[id*="trigger-"]').forEach(btn => {
            const key = btn.querySelector('div:first-child');
            const value = btn.querySelector('div:last-child');
            if (key && value) {
                const k = key.textContent.trim();
                const v = value.textContent.trim();
                if (k && v) info.performance[k] = v;
            }
        });

        details.supplier_info = info;
    }

    return details;
})()
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_image_url_upgrades_quality() {
        let extractor = AlibabaExtractor::new();
        assert_eq!(
            extractor.normalize_image_url("https://s.alicdn.com/x/pic_250x250.jpg"),
            "https://s.alicdn.com/x/pic_720x720q50.jpg"
        );
    }

    #[test]
    fn test_normalize_image_url_fixes_protocol() {
        let extractor = AlibabaExtractor::new();
        assert_eq!(
            extractor.normalize_image_url("//s.alicdn.com/img/a.jpg"),
            "https://s.alicdn.com/img/a.jpg"
        );
    }

    #[test]
    fn test_normalize_image_url_leaves_clean_urls() {
        let extractor = AlibabaExtractor::new();
        let url = "https://s.alicdn.com/img/a_720x720q50.jpg";
        assert_eq!(
            extractor.normalize_image_url(url),
            "https://s.alicdn.com/img/a_720x720q50.jpg"
        );
    }
}
