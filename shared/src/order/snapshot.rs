//! Filtered order-set snapshots and their diffs
//!
//! A feed subscription delivers the full filtered order list together with the
//! changes relative to the previous delivery. The first delivery of a
//! connection reports every order as `Added`.

use super::{Order, OrderStatus};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Subscription / query filter
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl OrderFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn waiter(mut self, waiter_id: impl Into<String>) -> Self {
        self.waiter_id = Some(waiter_id.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Predicate part of the filter (ignores `limit`)
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(status) = self.status
            && order.status != status
        {
            return false;
        }
        if let Some(ref waiter_id) = self.waiter_id
            && &order.waiter_id != waiter_id
        {
            return false;
        }
        true
    }

    /// Sort by `timestamp` descending and apply `limit`
    pub fn arrange(&self, orders: &mut Vec<Order>) {
        orders.sort_by(newest_first);
        if let Some(limit) = self.limit {
            orders.truncate(limit);
        }
    }
}

/// Ordering used by every query: newest first, id as tie-break
pub fn newest_first(a: &Order, b: &Order) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| a.id.cmp(&b.id))
}

/// Kind of change relative to the previous snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A single document change
///
/// For `Removed`, `order` is the last version seen before removal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderChange {
    pub kind: ChangeKind,
    pub order: Order,
}

impl OrderChange {
    pub fn added(order: Order) -> Self {
        Self {
            kind: ChangeKind::Added,
            order,
        }
    }

    pub fn modified(order: Order) -> Self {
        Self {
            kind: ChangeKind::Modified,
            order,
        }
    }

    pub fn removed(order: Order) -> Self {
        Self {
            kind: ChangeKind::Removed,
            order,
        }
    }

    pub fn order_id(&self) -> &str {
        &self.order.id
    }
}
