//! CDP 鼠标原语
//!
//! 通过 `Input.dispatchMouseEvent` 模拟物理鼠标：按下、相对移动、释放。
//! 滑块拖动策略全部建立在这三个原语之上。

use crate::error::{Result, ScrapeError};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::Page;

/// 鼠标驱动器，跟踪当前指针坐标
pub struct PointerDriver<'a> {
    page: &'a Page,
    x: f64,
    y: f64,
}

impl<'a> PointerDriver<'a> {
    /// 在指定起始坐标创建驱动器
    pub fn new(page: &'a Page, x: f64, y: f64) -> Self {
        Self { page, x, y }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// 移动到绝对坐标（未按下状态）
    pub async fn move_to(&mut self, x: f64, y: f64) -> Result<()> {
        self.x = x;
        self.y = y;
        self.dispatch(DispatchMouseEventType::MouseMoved, 0).await
    }

    /// 在当前位置按下左键
    pub async fn press(&mut self) -> Result<()> {
        self.dispatch(DispatchMouseEventType::MousePressed, 1).await
    }

    /// 按住状态下相对移动
    pub async fn move_by(&mut self, dx: f64, dy: f64) -> Result<()> {
        self.x += dx;
        self.y += dy;
        self.dispatch(DispatchMouseEventType::MouseMoved, 1).await
    }

    /// 在当前位置释放左键
    pub async fn release(&mut self) -> Result<()> {
        self.dispatch(DispatchMouseEventType::MouseReleased, 0).await
    }

    async fn dispatch(&self, kind: DispatchMouseEventType, buttons: i64) -> Result<()> {
        let params = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(self.x)
            .y(self.y)
            .button(MouseButton::Left)
            .buttons(buttons)
            .click_count(1)
            .build()
            .map_err(ScrapeError::Other)?;

        self.page.execute(params).await?;
        Ok(())
    }
}
