//! OrdersManager - the Order Store
//!
//! This module handles:
//! - Tenant resolution and access policy
//! - Order creation with a per-day order number (one write transaction)
//! - Status transitions, enforced centrally
//! - Filtered queries, newest first
//! - Publishing every committed write to the [`OrderBus`]
//!
//! # Create Flow
//!
//! ```text
//! create_order(tenant, draft)
//!     ├─ 1. Resolve tenant (TenantMissing / PermissionDenied)
//!     ├─ 2. Validate draft, verify totalAmount
//!     ├─ 3. Begin write transaction          ┐
//!     ├─ 4. Increment (tenant, day) counter  │ retried as a whole
//!     ├─ 5. Persist order (status=pending)   │ on transient failure
//!     ├─ 6. Bump commit sequence             │
//!     ├─ 7. Commit                           ┘
//!     └─ 8. Publish mutation
//! ```

mod error;
pub use error::*;

#[cfg(test)]
mod tests;

use super::money;
use super::numbering::OrderNumberGenerator;
use super::storage::{OrderStorage, SequencedOrders, StorageError, StorageResult};
use crate::core::Config;
use crate::message::OrderBus;
use crate::utils::{RetryConfig, RetryError, retry_blocking};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use shared::order::{CreatedOrder, Order, OrderDraft, OrderFilter, OrderStatus};
use std::collections::HashSet;
use std::path::Path;

/// Construction options
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Business timezone for order-number days
    pub tz: Tz,
    /// `None` allows every restaurant
    pub allowed_restaurants: Option<HashSet<String>>,
    pub counter_retry: RetryConfig,
    pub channel_capacity: usize,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            tz: chrono_tz::UTC,
            allowed_restaurants: None,
            counter_retry: RetryConfig::default(),
            channel_capacity: crate::message::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl From<&Config> for ManagerOptions {
    fn from(config: &Config) -> Self {
        Self {
            tz: config.timezone,
            allowed_restaurants: config.allowed_restaurant_set(),
            counter_retry: config.counter_retry(),
            channel_capacity: config.channel_capacity,
        }
    }
}

/// Order Store
pub struct OrdersManager {
    storage: OrderStorage,
    bus: OrderBus,
    numbers: OrderNumberGenerator,
    allowed_restaurants: Option<HashSet<String>>,
    counter_retry: RetryConfig,
    /// Held from begin_write through publish, so the bus sees commits in
    /// sequence order
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for OrdersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersManager")
            .field("storage", &"<OrderStorage>")
            .field("tz", &self.numbers.tz())
            .field("allowed_restaurants", &self.allowed_restaurants)
            .finish()
    }
}

impl OrdersManager {
    /// Open the database at `db_path`
    pub fn new(db_path: impl AsRef<Path>, options: ManagerOptions) -> ManagerResult<Self> {
        let storage = OrderStorage::open(db_path)?;
        Ok(Self::with_storage(storage, options))
    }

    /// Create an OrdersManager with existing storage
    pub fn with_storage(storage: OrderStorage, options: ManagerOptions) -> Self {
        tracing::debug!(tz = %options.tz, "OrdersManager initialised");
        Self {
            storage,
            bus: OrderBus::with_capacity(options.channel_capacity),
            numbers: OrderNumberGenerator::new(options.tz),
            allowed_restaurants: options.allowed_restaurants,
            counter_retry: options.counter_retry,
            write_lock: Mutex::new(()),
        }
    }

    /// Bus carrying every committed write
    pub fn bus(&self) -> &OrderBus {
        &self.bus
    }

    /// Get the underlying storage
    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    /// Trim and check the restaurant scope
    pub fn resolve_tenant<'a>(&self, restaurant_id: &'a str) -> ManagerResult<&'a str> {
        let restaurant_id = restaurant_id.trim();
        if restaurant_id.is_empty() {
            return Err(ManagerError::TenantMissing);
        }
        if let Some(ref allowed) = self.allowed_restaurants
            && !allowed.contains(restaurant_id)
        {
            return Err(ManagerError::PermissionDenied(restaurant_id.to_string()));
        }
        Ok(restaurant_id)
    }

    // ========== Writes ==========

    /// Create a pending order and assign its order number
    pub fn create_order(
        &self,
        restaurant_id: &str,
        draft: &OrderDraft,
    ) -> ManagerResult<CreatedOrder> {
        self.create_order_at(restaurant_id, draft, shared::util::now_utc())
    }

    /// [`create_order`](Self::create_order) with an explicit creation time
    pub fn create_order_at(
        &self,
        restaurant_id: &str,
        draft: &OrderDraft,
        now: DateTime<Utc>,
    ) -> ManagerResult<CreatedOrder> {
        let restaurant_id = self.resolve_tenant(restaurant_id)?;
        let total_amount = money::verify_draft(draft).map_err(|e| {
            tracing::warn!(restaurant_id, error = %e, "Rejected order draft");
            ManagerError::InvalidOrder(e.0)
        })?;
        let order_id = uuid::Uuid::new_v4().to_string();

        let guard = self.write_lock.lock();
        let (order, sequence) = retry_blocking(&self.counter_retry, |_attempt| {
            self.insert_new_order(restaurant_id, &order_id, draft, total_amount, now)
        })
        .map_err(|e| match e {
            RetryError::Exhausted { attempts, last } => {
                tracing::error!(restaurant_id, attempts, error = %last, "Order number transaction gave up");
                ManagerError::TransactionConflict { attempts }
            }
            RetryError::Permanent(e) => ManagerError::Storage(e),
        })?;
        self.bus.publish(sequence, &order);
        drop(guard);

        tracing::info!(
            restaurant_id,
            order_id = %order.id,
            order_number = %order.order_number,
            table = %order.table,
            waiter_id = %order.waiter_id,
            "Order created"
        );

        Ok(CreatedOrder {
            id: order.id,
            order_number: order.order_number,
        })
    }

    /// Counter increment and insert, committed together
    fn insert_new_order(
        &self,
        restaurant_id: &str,
        order_id: &str,
        draft: &OrderDraft,
        total_amount: f64,
        now: DateTime<Utc>,
    ) -> StorageResult<(Order, u64)> {
        let txn = self.storage.begin_write()?;
        let number = self
            .numbers
            .next_in(&self.storage, &txn, restaurant_id, now)?;

        let order = Order {
            id: order_id.to_string(),
            restaurant_id: restaurant_id.to_string(),
            order_number: number.display,
            table: draft.table.trim().to_string(),
            items: draft.items.clone(),
            status: OrderStatus::Pending,
            waiter_id: draft.waiter_id.clone(),
            waiter_name: draft.waiter_name.clone(),
            total_amount,
            timestamp: now,
            completed_at: None,
        };
        self.storage.put_order(&txn, &order)?;
        let sequence = self.storage.increment_sequence(&txn)?;
        txn.commit()?;

        Ok((order, sequence))
    }

    /// Apply a status transition; returns the updated order
    pub fn update_status(
        &self,
        restaurant_id: &str,
        order_id: &str,
        new_status: OrderStatus,
    ) -> ManagerResult<Order> {
        self.update_status_at(restaurant_id, order_id, new_status, shared::util::now_utc())
    }

    /// [`update_status`](Self::update_status) with an explicit time for `completedAt`
    pub fn update_status_at(
        &self,
        restaurant_id: &str,
        order_id: &str,
        new_status: OrderStatus,
        now: DateTime<Utc>,
    ) -> ManagerResult<Order> {
        let restaurant_id = self.resolve_tenant(restaurant_id)?;

        let guard = self.write_lock.lock();
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, restaurant_id, order_id)?
            .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))?;

        let from = order.status;
        order.status = from.transition(new_status).map_err(|e| {
            tracing::warn!(restaurant_id, order_id, from = %e.from, to = %e.to, "Rejected status transition");
            ManagerError::InvalidTransition {
                order_id: order_id.to_string(),
                from: e.from,
                to: e.to,
            }
        })?;
        if order.status == OrderStatus::Delivered {
            order.completed_at = Some(now);
        }

        self.storage.put_order(&txn, &order)?;
        let sequence = self.storage.increment_sequence(&txn)?;
        txn.commit().map_err(StorageError::from)?;
        self.bus.publish(sequence, &order);
        drop(guard);

        tracing::info!(
            restaurant_id,
            order_id,
            order_number = %order.order_number,
            from = %from,
            status = %order.status,
            "Order status changed"
        );

        Ok(order)
    }

    // ========== Reads ==========

    pub fn get_order(&self, restaurant_id: &str, order_id: &str) -> ManagerResult<Order> {
        let restaurant_id = self.resolve_tenant(restaurant_id)?;
        self.storage
            .get_order(restaurant_id, order_id)?
            .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))
    }

    /// Orders matching `filter`, newest first
    pub fn query(&self, restaurant_id: &str, filter: &OrderFilter) -> ManagerResult<Vec<Order>> {
        Ok(self.query_sequenced(restaurant_id, filter)?.orders)
    }

    /// [`query`](Self::query) plus the commit sequence the result reflects
    pub fn query_sequenced(
        &self,
        restaurant_id: &str,
        filter: &OrderFilter,
    ) -> ManagerResult<SequencedOrders> {
        let restaurant_id = self.resolve_tenant(restaurant_id)?;
        let SequencedOrders { orders, sequence } =
            self.storage.list_orders_sequenced(restaurant_id)?;

        let mut orders: Vec<Order> = orders.into_iter().filter(|o| filter.matches(o)).collect();
        filter.arrange(&mut orders);

        Ok(SequencedOrders { orders, sequence })
    }
}
