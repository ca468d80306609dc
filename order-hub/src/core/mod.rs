//! 核心模块 - 配置、状态和错误定义
//!
//! # 模块结构
//!
//! - [`Config`] - 服务配置
//! - [`HubState`] - 服务状态
//! - [`HubError`] - 启动错误

pub mod config;
pub mod error;
pub mod state;

pub use config::{Config, FeedBackend, RejectedValue};
pub use error::{HubError, Result};
pub use state::HubState;
