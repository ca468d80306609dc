//! Notification dispatcher
//!
//! Turns feed snapshots into at-most-once role notifications. Owns the
//! `handled` set (order id -> order number) for its whole lifetime, across
//! feed reconnections.
//!
//! # Rules
//!
//! - First snapshot ever: record every id, raise nothing. If the feed marks
//!   it `late_start`, it may hold orders written after subscribing, so every
//!   order in the role set is announced instead.
//! - Order enters the role set, id not handled: record, raise `NewOrder`.
//! - Order leaves the role set, id handled: forget, raise `OrderNoLongerReady`
//!   (waiter only; the kitchen forgets silently).
//! - Anything else (repeat adds, modifications inside the set, removals of
//!   unknown ids) is ignored.
//! - First snapshot after a reconnect: diff against `handled` instead of
//!   suppressing, so nothing already handled fires again.

use crate::feed::FeedSnapshot;
use shared::order::{ChangeKind, Notification, NotificationRole, Order, OrderFilter};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the very first snapshot
    Initial,
    /// Waiting for the first snapshot of a new connection
    Reconnected,
    Live,
}

#[derive(Debug)]
pub struct NotificationDispatcher {
    role: NotificationRole,
    filter: OrderFilter,
    handled: HashMap<String, String>,
    phase: Phase,
}

impl NotificationDispatcher {
    pub fn new(role: NotificationRole) -> Self {
        Self {
            filter: role.filter(),
            role,
            handled: HashMap::new(),
            phase: Phase::Initial,
        }
    }

    pub fn role(&self) -> &NotificationRole {
        &self.role
    }

    pub fn is_handled(&self, order_id: &str) -> bool {
        self.handled.contains_key(order_id)
    }

    pub fn handled_count(&self) -> usize {
        self.handled.len()
    }

    /// A new feed connection starts; its first snapshot is reconciled
    pub fn begin_connection(&mut self) {
        if self.phase != Phase::Initial {
            self.phase = Phase::Reconnected;
        }
    }

    pub fn handle(&mut self, snapshot: &FeedSnapshot) -> Vec<Notification> {
        match self.phase {
            Phase::Initial if snapshot.late_start => {
                self.phase = Phase::Live;
                tracing::debug!(role = self.role.name(), "Late initial snapshot, announcing");
                self.reconcile(&snapshot.orders)
            }
            Phase::Initial => {
                self.phase = Phase::Live;
                for order in snapshot.orders.iter().filter(|o| self.filter.matches(o)) {
                    self.handled
                        .insert(order.id.clone(), order.order_number.clone());
                }
                tracing::debug!(
                    role = self.role.name(),
                    suppressed = self.handled.len(),
                    "Initial snapshot recorded"
                );
                Vec::new()
            }
            Phase::Reconnected => {
                self.phase = Phase::Live;
                self.reconcile(&snapshot.orders)
            }
            Phase::Live => self.apply_changes(snapshot),
        }
    }

    fn apply_changes(&mut self, snapshot: &FeedSnapshot) -> Vec<Notification> {
        let mut raised = Vec::new();

        for change in &snapshot.changes {
            let order = &change.order;
            let in_set = change.kind != ChangeKind::Removed && self.filter.matches(order);

            match (self.handled.contains_key(&order.id), in_set) {
                (false, true) => self.announce(order, &mut raised),
                (true, false) => self.clear(&order.id, &mut raised),
                (true, true) => {}
                (false, false) => {
                    tracing::trace!(role = self.role.name(), order_id = %order.id, kind = ?change.kind, "Change outside role set ignored");
                }
            }
        }

        raised
    }

    fn reconcile(&mut self, orders: &[Order]) -> Vec<Notification> {
        let mut raised = Vec::new();
        let current: HashSet<&str> = orders
            .iter()
            .filter(|o| self.filter.matches(o))
            .map(|o| o.id.as_str())
            .collect();

        let mut gone: Vec<String> = self
            .handled
            .keys()
            .filter(|id| !current.contains(id.as_str()))
            .cloned()
            .collect();
        gone.sort();
        for order_id in gone {
            self.clear(&order_id, &mut raised);
        }

        for order in orders {
            if current.contains(order.id.as_str()) && !self.handled.contains_key(&order.id) {
                self.announce(order, &mut raised);
            }
        }

        tracing::debug!(
            role = self.role.name(),
            raised = raised.len(),
            handled = self.handled.len(),
            "Reconnect snapshot reconciled"
        );
        raised
    }

    fn announce(&mut self, order: &Order, raised: &mut Vec<Notification>) {
        self.handled
            .insert(order.id.clone(), order.order_number.clone());
        tracing::debug!(
            role = self.role.name(),
            order_id = %order.id,
            order_number = %order.order_number,
            "New order notification"
        );
        raised.push(Notification::NewOrder {
            order: order.clone(),
        });
    }

    fn clear(&mut self, order_id: &str, raised: &mut Vec<Notification>) {
        let Some(order_number) = self.handled.remove(order_id) else {
            return;
        };
        if !self.role.emits_cleared() {
            return;
        }
        tracing::debug!(
            role = self.role.name(),
            order_id,
            order_number = %order_number,
            "Order no longer ready notification"
        );
        raised.push(Notification::OrderNoLongerReady {
            order_id: order_id.to_string(),
            order_number,
        });
    }
}
