//! # Alibaba Scraper
//!
//! 面向 JS 渲染目录站点的自动化采集程序
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure / Browser）
//! - `browser/` - 隔离会话启动、反检测注入、CDP 指针原语
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() / 滚动 / 导航能力
//!
//! ### ② 业务能力层（Capabilities）
//! - `captcha/` - 滑块验证码的检测、轨迹合成与升级式破解
//! - `navigation` - 带重试的页面导航，内联验证码处理
//! - `extract/` - 站点提取器接口与 Alibaba 实现
//! - `clients/` - 后端目录 API（拉任务 / 标记完成 / 上传产品）
//! - `persistence/` - CSV / JSON / 图片清单落盘
//! - `notify` - 桌面 / 日志 / 静默通知
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/harvest` - 单次运行的四阶段流水线
//! - `orchestrator/supervisor` - 整体重试外环与会话生命周期
//!
//! ## 模块结构

pub mod browser;
pub mod captcha;
pub mod clients;
pub mod config;
pub mod error;
pub mod extract;
pub mod infrastructure;
pub mod models;
pub mod navigation;
pub mod notify;
pub mod orchestrator;
pub mod persistence;
pub mod utils;

// 重新导出常用类型
pub use browser::Session;
pub use captcha::{CaptchaResolver, CaptchaStrategy, Resolution};
pub use clients::CatalogApi;
pub use config::Config;
pub use error::{Result, ScrapeError};
pub use extract::{AlibabaExtractor, Extractor};
pub use infrastructure::JsExecutor;
pub use models::{Candidate, DetailRecord, RunSummary, WorkItem};
pub use orchestrator::{ExecutionSupervisor, HarvestOrchestrator};
pub use utils::CancelToken;
