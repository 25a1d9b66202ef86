//! 浏览器层
//!
//! ## 模块划分
//!
//! - `session` - 浏览器会话：隔离 profile、反检测启动、作用域清理
//! - `pointer` - CDP 鼠标原语（press / move / release），滑块拖动的底层能力

pub mod pointer;
pub mod session;

pub use pointer::PointerDriver;
pub use session::Session;
