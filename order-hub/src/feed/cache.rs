//! Last-delivered result per connection
//!
//! Turns successive full results into change lists and suppresses results
//! identical to the previous delivery.

use shared::order::{Order, OrderChange};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SnapshotCache {
    previous: Option<Vec<Order>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `current` against the previous result
    ///
    /// The first call always returns the full list as `Added`. Later calls
    /// return `None` when nothing changed. Removals come first, in previous
    /// order, then additions and modifications in current order.
    pub fn update(&mut self, current: &[Order]) -> Option<Vec<OrderChange>> {
        let Some(previous) = self.previous.replace(current.to_vec()) else {
            return Some(current.iter().cloned().map(OrderChange::added).collect());
        };

        let before: HashMap<&str, &Order> =
            previous.iter().map(|o| (o.id.as_str(), o)).collect();
        let after: HashMap<&str, &Order> = current.iter().map(|o| (o.id.as_str(), o)).collect();

        let mut changes: Vec<OrderChange> = previous
            .iter()
            .filter(|o| !after.contains_key(o.id.as_str()))
            .cloned()
            .map(OrderChange::removed)
            .collect();

        for order in current {
            match before.get(order.id.as_str()) {
                None => changes.push(OrderChange::added(order.clone())),
                Some(old) if *old != order => changes.push(OrderChange::modified(order.clone())),
                Some(_) => {}
            }
        }

        (!changes.is_empty()).then_some(changes)
    }
}
