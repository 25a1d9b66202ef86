//! JS 执行器 - 基础设施层
//!
//! 持有 page 资源，向上层暴露"执行 JS / 导航 / 滚动"的能力。
//! 不认识 WorkItem / Candidate，不处理业务流程。

use crate::error::Result;
use chromiumoxide::Page;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

/// JS 执行器
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（指针原语等底层操作需要）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 导航到指定 URL
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        Ok(())
    }

    /// 重新加载当前页面
    pub async fn reload(&self) -> Result<()> {
        self.page.reload().await?;
        Ok(())
    }

    /// 当前页面地址
    pub async fn current_url(&self) -> Result<Option<String>> {
        let url = self.page.url().await?;
        Ok(url)
    }

    /// 轮询等待选择器出现，超时返回 false
    pub async fn wait_for_presence(&self, selector: &str, timeout_secs: u64) -> Result<bool> {
        let deadline = Instant::now() + Duration::from_secs(timeout_secs);
        let js = format!(
            "document.querySelectorAll('{}').length > 0",
            selector.replace('\'', "\\'")
        );

        loop {
            if self.eval_as::<bool>(js.as_str()).await.unwrap_or(false) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                debug!("等待元素超时: {}", selector);
                return Ok(false);
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    /// 用 JS 点击第一个匹配的元素，返回是否命中
    pub async fn click_js(&self, selector: &str) -> Result<bool> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                if (el) {{ el.click(); return true; }}
                return false;
            }})()"#,
            selector.replace('\'', "\\'")
        );
        self.eval_as::<bool>(js).await
    }

    /// 智能滚动：随机步长向下滚动，页面高度连续三次不变后滚到底
    pub async fn smart_scroll(&self) -> Result<()> {
        let mut last_height = self
            .eval_as::<f64>("document.body.scrollHeight")
            .await
            .unwrap_or(0.0);
        let mut no_change_count = 0;

        while no_change_count < 3 {
            let distance = rand::thread_rng().gen_range(500..1000);
            self.eval(format!("window.scrollBy(0, {});", distance))
                .await?;
            let wait_ms = rand::thread_rng().gen_range(500..1000);
            sleep(Duration::from_millis(wait_ms)).await;

            let new_height = self
                .eval_as::<f64>("document.body.scrollHeight")
                .await
                .unwrap_or(last_height);

            if (new_height - last_height).abs() < f64::EPSILON {
                no_change_count += 1;
            } else {
                no_change_count = 0;
                last_height = new_height;
            }
        }

        self.eval("window.scrollTo(0, document.body.scrollHeight);")
            .await?;
        Ok(())
    }
}
