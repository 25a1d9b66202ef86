//! 错误类型定义
//!
//! 按照错误的处理层级划分：
//! - `Navigation` / `CaptchaExhausted` / `Extraction` 属于页面级错误，
//!   由导航器和编排器在本地重试或跳过，不会中断整个批次
//! - `Api` / `File` 根据发生的阶段决定是否致命（持久化阶段的 IO 错误是致命的）
//! - `Session` 是会话级致命错误，由 ExecutionSupervisor 整体重试
//! - `Cancelled` 表示用户取消，任何层级都不再重试

use thiserror::Error;

/// 爬虫错误类型
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// 页面导航失败（可在导航器内重试）
    #[error("导航失败 ({url}): {reason}")]
    Navigation { url: String, reason: String },

    /// 滑块验证码在所有尝试后仍未解决（非致命，跳过当前页面）
    #[error("滑块验证码未能解决 (已尝试 {attempts} 次)")]
    CaptchaExhausted { attempts: usize },

    /// 页面数据提取失败（跳过当前条目）
    #[error("数据提取失败: {0}")]
    Extraction(String),

    /// 后端 API 调用失败
    #[error("API 请求失败 ({endpoint}): {source}")]
    Api {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// 文件写入失败（持久化阶段视为致命）
    #[error("文件操作失败 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 浏览器会话级错误（致命，整体重试）
    #[error("浏览器会话错误: {0}")]
    Session(#[from] chromiumoxide::error::CdpError),

    /// JSON 序列化/反序列化失败
    #[error("JSON 处理失败: {0}")]
    Json(#[from] serde_json::Error),

    /// 用户取消（立即中止，不再重试）
    #[error("用户取消操作")]
    Cancelled,

    /// 执行重试次数耗尽
    #[error("所有执行尝试均失败 (共 {attempts} 次)")]
    ExecutionExhausted { attempts: usize },

    /// 其他错误
    #[error("{0}")]
    Other(String),
}

impl ScrapeError {
    /// 构造 API 错误
    pub fn api(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        ScrapeError::Api {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// 构造文件错误
    pub fn file(path: impl Into<String>, source: std::io::Error) -> Self {
        ScrapeError::File {
            path: path.into(),
            source,
        }
    }

    /// 是否为用户取消
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScrapeError::Cancelled)
    }
}

/// 爬虫结果类型
pub type Result<T> = std::result::Result<T, ScrapeError>;
