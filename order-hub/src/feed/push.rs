//! Push adapter
//!
//! Keeps a filtered view per subscription, seeded from one store read and
//! advanced by committed documents from the `OrderBus`.
//!
//! The initial read returns the commit sequence it reflects. Mutations at or
//! below that sequence are already in the view and are skipped. The store
//! publishes in commit order, so the view keeps a single high-water mark
//! rather than per-order state.
//! If the bus receiver lags, the view is rebuilt from the store. Failed
//! reads other than a permission denial are retried until unsubscribed.

use super::{ChangeFeed, FeedError, FeedRequest, FeedSubscription, SnapshotCache, SnapshotSink};
use crate::message::OrderMutation;
use crate::orders::{ManagerError, OrdersManager, SequencedOrders};
use crate::utils::RetryConfig;
use async_trait::async_trait;
use shared::order::{Order, OrderFilter};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Clone)]
pub struct PushFeed {
    manager: Arc<OrdersManager>,
    load_retry: RetryConfig,
}

impl PushFeed {
    pub fn new(manager: Arc<OrdersManager>) -> Self {
        Self {
            manager,
            load_retry: RetryConfig::reconnect(),
        }
    }

    /// Backoff for failed store reads (initial load and resync);
    /// `max_attempts` is ignored
    pub fn with_load_retry(mut self, retry: RetryConfig) -> Self {
        self.load_retry = retry;
        self
    }
}

#[async_trait]
impl ChangeFeed for PushFeed {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn subscribe(&self, request: FeedRequest) -> Result<FeedSubscription, FeedError> {
        let restaurant_id = super::resolve_scope(&self.manager, &request.restaurant_id)?;
        let manager = self.manager.clone();
        let retry = self.load_retry.clone();
        // Subscribe before the initial read so nothing committed after it is lost
        let mutations = manager.bus().subscribe_mutations();

        tracing::debug!(restaurant_id = %restaurant_id, purpose = ?request.purpose, "Push subscription opened");

        // First attempt happens before returning; failures are retried by the task
        let initial = match manager.query_sequenced(&restaurant_id, &unlimited(&request.filter)) {
            Ok(read) => Some(Load::Ready(PushView::seeded(read))),
            Err(ManagerError::PermissionDenied(_)) => Some(Load::Denied),
            Err(e) => {
                tracing::warn!(restaurant_id = %restaurant_id, error = %e, "Push view load failed, retrying in background");
                None
            }
        };

        Ok(FeedSubscription::spawn(move |sink| {
            push_loop(manager, restaurant_id, request.filter, retry, initial, mutations, sink)
        }))
    }
}

/// Unlimited filtered view of one restaurant
#[derive(Debug, Default)]
struct PushView {
    /// Highest commit sequence reflected in the view
    last_sequence: u64,
    orders: HashMap<String, Order>,
}

impl PushView {
    fn seeded(read: SequencedOrders) -> Self {
        Self {
            last_sequence: read.sequence,
            orders: read
                .orders
                .into_iter()
                .map(|o| (o.id.clone(), o))
                .collect(),
        }
    }

    /// Apply one committed document; `true` if the view may have changed
    fn apply(&mut self, mutation: &OrderMutation, filter: &OrderFilter) -> bool {
        if mutation.sequence <= self.last_sequence {
            return false;
        }
        self.last_sequence = mutation.sequence;

        let id = &mutation.order.id;
        if filter.matches(&mutation.order) {
            self.orders.insert(id.clone(), mutation.order.clone());
            true
        } else {
            self.orders.remove(id).is_some()
        }
    }

    /// Current result with sort and limit applied
    fn arranged(&self, filter: &OrderFilter) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.values().cloned().collect();
        filter.arrange(&mut orders);
        orders
    }
}

/// The view holds every match; `limit` applies when emitting
fn unlimited(filter: &OrderFilter) -> OrderFilter {
    OrderFilter {
        limit: None,
        ..filter.clone()
    }
}

enum Load {
    Ready(PushView),
    Denied,
    Stopped,
}

/// Read the full filtered set, retrying with backoff until it succeeds,
/// access is denied, or the subscriber leaves
async fn load_view(
    manager: &OrdersManager,
    restaurant_id: &str,
    filter: &OrderFilter,
    retry: &RetryConfig,
    sink: &SnapshotSink,
) -> Load {
    let full = unlimited(filter);
    let mut attempt = 0u32;

    loop {
        attempt = attempt.saturating_add(1);
        match manager.query_sequenced(restaurant_id, &full) {
            Ok(read) => {
                if attempt > 1 {
                    tracing::info!(restaurant_id, attempt, "Push view loaded after retry");
                }
                return Load::Ready(PushView::seeded(read));
            }
            Err(ManagerError::PermissionDenied(_)) => return Load::Denied,
            Err(e) => {
                let delay = retry.delay_for(attempt);
                if e.is_retryable() {
                    tracing::warn!(restaurant_id, attempt, error = %e, delay_ms = delay.as_millis() as u64, "Push view load failed, retrying");
                } else {
                    tracing::error!(restaurant_id, attempt, error = %e, delay_ms = delay.as_millis() as u64, "Push view load failed, retrying");
                }
                tokio::select! {
                    _ = sink.cancelled() => return Load::Stopped,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

async fn emit(view: &PushView, filter: &OrderFilter, cache: &mut SnapshotCache, sink: &mut SnapshotSink) -> bool {
    let orders = view.arranged(filter);
    match cache.update(&orders) {
        Some(changes) => sink.deliver(orders, changes).await,
        None => true,
    }
}

async fn push_loop(
    manager: Arc<OrdersManager>,
    restaurant_id: String,
    filter: OrderFilter,
    retry: RetryConfig,
    initial: Option<Load>,
    mut mutations: broadcast::Receiver<Arc<OrderMutation>>,
    mut sink: SnapshotSink,
) {
    let first = match initial {
        Some(load) => load,
        None => {
            sink.mark_late_start();
            load_view(&manager, &restaurant_id, &filter, &retry, &sink).await
        }
    };
    let mut view = match first {
        Load::Ready(view) => view,
        Load::Denied => {
            sink.deny(&restaurant_id).await;
            return;
        }
        Load::Stopped => return,
    };
    let mut cache = SnapshotCache::new();
    if !emit(&view, &filter, &mut cache, &mut sink).await {
        return;
    }

    loop {
        let received = tokio::select! {
            _ = sink.cancelled() => break,
            received = mutations.recv() => received,
        };

        match received {
            Ok(mutation) => {
                if mutation.restaurant_id != restaurant_id || !view.apply(&mutation, &filter) {
                    continue;
                }
                if !emit(&view, &filter, &mut cache, &mut sink).await {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(restaurant_id = %restaurant_id, skipped, "Push subscriber lagged, resyncing");
                match load_view(&manager, &restaurant_id, &filter, &retry, &sink).await {
                    Load::Ready(fresh) => view = fresh,
                    Load::Denied | Load::Stopped => break,
                }
                if !emit(&view, &filter, &mut cache, &mut sink).await {
                    break;
                }
            }
            Err(RecvError::Closed) => {
                tracing::debug!(restaurant_id = %restaurant_id, "Order bus closed");
                break;
            }
        }
    }

    tracing::debug!(restaurant_id = %restaurant_id, "Push subscription closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::{ManagerOptions, OrderStorage};
    use shared::order::{OrderDraft, OrderItem, OrderStatus};
    use std::time::Duration;

    fn order(id: &str, status: OrderStatus) -> Order {
        Order {
            id: id.to_string(),
            restaurant_id: "R1".to_string(),
            order_number: "11".to_string(),
            table: "T1".to_string(),
            items: vec![],
            status,
            waiter_id: "w1".to_string(),
            waiter_name: "Waiter".to_string(),
            total_amount: 0.0,
            timestamp: shared::util::now_utc(),
            completed_at: None,
        }
    }

    fn mutation(sequence: u64, order: Order) -> OrderMutation {
        OrderMutation {
            sequence,
            restaurant_id: order.restaurant_id.clone(),
            order,
        }
    }

    #[test]
    fn test_view_skips_mutations_already_read() {
        let filter = OrderFilter::with_status(OrderStatus::Pending);
        let mut view = PushView::seeded(SequencedOrders {
            orders: vec![order("a", OrderStatus::Pending)],
            sequence: 5,
        });

        // Committed before the read: must not resurrect or remove anything
        assert!(!view.apply(&mutation(4, order("a", OrderStatus::Cooking)), &filter));
        assert!(view.orders.contains_key("a"));

        assert!(view.apply(&mutation(6, order("a", OrderStatus::Cooking)), &filter));
        assert!(view.orders.is_empty());
    }

    #[test]
    fn test_view_ignores_replayed_document() {
        let filter = OrderFilter::with_status(OrderStatus::Pending);
        let mut view = PushView::default();

        assert!(!view.apply(&mutation(3, order("a", OrderStatus::Cooking)), &filter));
        // Older pending version delivered again
        assert!(!view.apply(&mutation(2, order("a", OrderStatus::Pending)), &filter));
        assert!(view.orders.is_empty());
    }

    #[test]
    fn test_view_state_bounded_by_matches() {
        let filter = OrderFilter::with_status(OrderStatus::Ready).waiter("w1");
        let mut view = PushView::default();

        for seq in 1..=10_000u64 {
            let mut other = order(&format!("o{seq}"), OrderStatus::Delivered);
            other.waiter_id = "w2".to_string();
            assert!(!view.apply(&mutation(seq, other), &filter));
        }
        assert!(view.orders.is_empty());
        assert_eq!(view.last_sequence, 10_000);
    }

    #[test]
    fn test_view_applies_limit_on_output_only() {
        let filter = OrderFilter::all().limit(1);
        let mut view = PushView::default();
        let mut older = order("a", OrderStatus::Pending);
        older.timestamp = older.timestamp - chrono::Duration::seconds(10);

        view.apply(&mutation(1, older), &filter);
        view.apply(&mutation(2, order("b", OrderStatus::Pending)), &filter);
        assert_eq!(view.orders.len(), 2);

        let arranged = view.arranged(&filter);
        assert_eq!(arranged.len(), 1);
        assert_eq!(arranged[0].id, "b");
    }

    #[tokio::test]
    async fn test_recovers_after_unreadable_store() {
        let storage = OrderStorage::open_in_memory().unwrap();
        storage.put_raw("R1", "bad", b"not json").unwrap();
        let manager = Arc::new(OrdersManager::with_storage(storage, ManagerOptions::default()));
        let fast = RetryConfig {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            ..RetryConfig::reconnect()
        };
        let feed = PushFeed::new(manager.clone()).with_load_retry(fast);

        let mut sub = feed
            .subscribe(FeedRequest::new("R1", OrderFilter::all()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        manager.storage().remove_raw("R1", "bad").unwrap();
        let draft = OrderDraft {
            table: "T1".to_string(),
            items: vec![OrderItem {
                menu_id: "m1".to_string(),
                name: "Soup".to_string(),
                price: 4.5,
                quantity: 2,
            }],
            waiter_id: "w1".to_string(),
            waiter_name: "Ana".to_string(),
            total_amount: 9.0,
        };
        let created = manager.create_order("R1", &draft).unwrap();

        let mut first = true;
        loop {
            let snapshot = tokio::time::timeout(Duration::from_secs(5), sub.next())
                .await
                .expect("snapshot in time")
                .expect("subscription open");
            if first {
                assert!(snapshot.late_start);
                first = false;
            } else {
                assert!(!snapshot.late_start);
            }
            if snapshot.orders.iter().any(|o| o.id == created.id) {
                break;
            }
        }
    }
}
