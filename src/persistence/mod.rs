//! 结果持久化层
//!
//! ## 职责
//! - CSV 主输出（固定列，Excel 兼容的引号转义）
//! - JSON 镜像输出
//! - 图片清单报告

pub mod csv;

pub use csv::ResultWriter;
