//! 滑块验证码处理
//!
//! ## 模块划分
//!
//! - `trajectory` - 人类化鼠标轨迹合成（加速 / 匀速 / 减速 + 过冲回正）
//! - `strategy` - 升级式破解策略及其选择规则
//! - `resolver` - 检测 → 定位 → 执行策略 → 验证 的状态机

pub mod resolver;
pub mod strategy;
pub mod trajectory;

pub use resolver::{CaptchaResolver, ChallengeOps, LiveChallengeOps, Resolution};
pub use strategy::CaptchaStrategy;
pub use trajectory::{MouseStep, TrajectoryGenerator};
