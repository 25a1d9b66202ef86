pub mod cancel;
pub mod logging;
pub mod timing;

pub use cancel::CancelToken;
