//! Role notifications delivered to the kitchen and waiter widgets

use super::{Order, OrderFilter, OrderStatus};
use serde::{Deserialize, Serialize};

/// Who is listening
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum NotificationRole {
    /// New pending tickets
    Kitchen,
    /// The waiter's own orders entering or leaving `ready`
    #[serde(rename_all = "camelCase")]
    Waiter { waiter_id: String },
}

impl NotificationRole {
    pub fn waiter(waiter_id: impl Into<String>) -> Self {
        NotificationRole::Waiter {
            waiter_id: waiter_id.into(),
        }
    }

    /// Feed filter for this role
    pub fn filter(&self) -> OrderFilter {
        match self {
            NotificationRole::Kitchen => OrderFilter::with_status(OrderStatus::Pending),
            NotificationRole::Waiter { waiter_id } => {
                OrderFilter::with_status(OrderStatus::Ready).waiter(waiter_id.clone())
            }
        }
    }

    /// Kitchen only announces arrivals
    pub fn emits_cleared(&self) -> bool {
        matches!(self, NotificationRole::Waiter { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            NotificationRole::Kitchen => "kitchen",
            NotificationRole::Waiter { .. } => "waiter",
        }
    }
}

/// Notification event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    /// Order entered the role's set after subscription
    NewOrder { order: Order },
    /// Order left the waiter's ready set (delivered or cancelled)
    #[serde(rename_all = "camelCase")]
    OrderNoLongerReady {
        order_id: String,
        order_number: String,
    },
}

impl Notification {
    pub fn order_id(&self) -> &str {
        match self {
            Notification::NewOrder { order } => &order.id,
            Notification::OrderNoLongerReady { order_id, .. } => order_id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Notification::NewOrder { .. })
    }
}
