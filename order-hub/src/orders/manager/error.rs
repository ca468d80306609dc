use crate::orders::storage::StorageError;
use shared::order::{CommandError, OrderErrorCode, OrderStatus};
use thiserror::Error;

/// Manager errors
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("No restaurant scope")]
    TenantMissing,

    #[error("Access denied for restaurant: {0}")]
    PermissionDenied(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Invalid transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Order number transaction failed after {attempts} attempts")]
    TransactionConflict { attempts: u32 },
}

impl ManagerError {
    pub fn code(&self) -> OrderErrorCode {
        match self {
            ManagerError::Storage(e) => classify_storage_error(e),
            ManagerError::TenantMissing => OrderErrorCode::TenantMissing,
            ManagerError::PermissionDenied(_) => OrderErrorCode::PermissionDenied,
            ManagerError::OrderNotFound(_) => OrderErrorCode::OrderNotFound,
            ManagerError::InvalidTransition { .. } => OrderErrorCode::InvalidTransition,
            ManagerError::InvalidOrder(_) => OrderErrorCode::InvalidOrder,
            ManagerError::TransactionConflict { .. } => OrderErrorCode::TransactionConflict,
        }
    }

    /// Whether the caller should retry the whole operation
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

/// 将存储错误转换为错误码
fn classify_storage_error(e: &StorageError) -> OrderErrorCode {
    match e {
        StorageError::Serialization(_) => OrderErrorCode::InternalError,
        StorageError::Transaction(_) | StorageError::Commit(_) => {
            OrderErrorCode::TransactionConflict
        }
        e if e.is_unavailable() => OrderErrorCode::NetworkFailure,
        _ => OrderErrorCode::InternalError,
    }
}

impl From<ManagerError> for CommandError {
    fn from(err: ManagerError) -> Self {
        let code = err.code();
        if let ManagerError::Storage(ref e) = err {
            tracing::error!(error = %e, error_code = ?code, "Storage error occurred");
        }
        CommandError::new(code, err.to_string())
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;
