//! 工具模块 - 日志与重试

pub mod logger;
pub mod retry;

pub use retry::{IsTransient, RetryConfig, RetryError, retry_blocking};
