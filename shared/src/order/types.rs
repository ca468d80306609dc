//! Shared order types (wire shape)

use super::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Order
// ============================================================================

/// One line of an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Menu entry ID
    pub menu_id: String,
    /// Menu entry name snapshot
    pub name: String,
    /// Unit price
    pub price: f64,
    /// Quantity (>= 1)
    pub quantity: u32,
}

/// Persisted order document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order ID (assigned by the store)
    pub id: String,
    /// Owning restaurant (tenant key), never reassigned
    pub restaurant_id: String,
    /// Display number `<dayOfMonth><perDayCounter>`
    pub order_number: String,
    /// Table designator
    pub table: String,
    /// Items, immutable after creation
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub waiter_id: String,
    pub waiter_name: String,
    pub total_amount: f64,
    /// Creation time, authoritative for ordering
    pub timestamp: DateTime<Utc>,
    /// Set only on transition into `delivered`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Caller-supplied fields for a new order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub table: String,
    pub items: Vec<OrderItem>,
    pub waiter_id: String,
    pub waiter_name: String,
    pub total_amount: f64,
}

/// Result of a successful `create_order`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub id: String,
    pub order_number: String,
}

// ============================================================================
// Errors
// ============================================================================

/// Command error (returned to the initiating role)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandError {
    pub code: OrderErrorCode,
    pub message: String,
}

impl CommandError {
    pub fn new(code: OrderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for CommandError {}

/// Error codes (frontend is responsible for localisation)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderErrorCode {
    TenantMissing,
    OrderNotFound,
    InvalidTransition,
    TransactionConflict,
    PermissionDenied,
    NetworkFailure,
    InvalidOrder,
    InternalError,
}

impl OrderErrorCode {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrderErrorCode::TransactionConflict | OrderErrorCode::NetworkFailure
        )
    }
}
