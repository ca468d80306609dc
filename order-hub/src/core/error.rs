use crate::orders::ManagerError;
use thiserror::Error;

/// Startup errors
#[derive(Error, Debug)]
pub enum HubError {
    #[error("工作目录错误: {0}")]
    WorkDir(#[from] std::io::Error),

    #[error("订单存储初始化失败: {0}")]
    Orders(#[from] ManagerError),
}

pub type Result<T> = std::result::Result<T, HubError>;
