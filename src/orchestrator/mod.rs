//! 流程编排层
//!
//! ## 模块划分
//!
//! - `harvest` - 单次运行的四阶段流水线（搜索 → 详情 → 落盘 → 回报）
//! - `supervisor` - 整体执行重试外环与会话生命周期管理

pub mod harvest;
pub mod supervisor;

pub use harvest::HarvestOrchestrator;
pub use supervisor::ExecutionSupervisor;
