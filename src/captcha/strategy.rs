//! 破解策略与升级规则
//!
//! 策略按尝试次数逐级升级：先快拖，再带轨迹的分段拖动，
//! 最后合成事件直发；位移余量随级别加大，抵消系统性的欠位移。

/// 滑块破解策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaStrategy {
    /// 一次到位的快速拖动
    FastDrag,
    /// 跟随人类化轨迹的分段拖动
    StagedDrag,
    /// 绕过物理拖动，直接派发合成鼠标事件
    SyntheticEvents,
    /// 连续多次快拖的激进兜底
    AggressiveRetry,
}

impl CaptchaStrategy {
    /// 按 1-based 尝试序号选择策略
    pub fn for_attempt(attempt: usize) -> Self {
        match attempt {
            0..=2 => CaptchaStrategy::FastDrag,
            3..=4 => CaptchaStrategy::StagedDrag,
            5 => CaptchaStrategy::SyntheticEvents,
            _ => CaptchaStrategy::AggressiveRetry,
        }
    }

    /// 位移余量（像素），随升级加大
    pub fn margin(&self) -> f64 {
        match self {
            CaptchaStrategy::FastDrag => 5.0,
            CaptchaStrategy::StagedDrag => 6.0,
            CaptchaStrategy::SyntheticEvents => 8.0,
            CaptchaStrategy::AggressiveRetry => 10.0,
        }
    }

    /// 目标位移 = 容器宽 - 滑块宽 + 余量
    pub fn displacement(&self, container_width: f64, handle_width: f64) -> f64 {
        container_width - handle_width + self.margin()
    }
}

/// 失败后是否强制整页刷新（从第二次失败起）
pub fn should_reload_after_failure(attempt: usize) -> bool {
    attempt >= 2
}
