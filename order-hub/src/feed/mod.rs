//! Change Feed - live, filtered, per-restaurant order sets
//!
//! Two interchangeable transports implement [`ChangeFeed`]:
//!
//! | Adapter      | Wake-up                                 | Source of truth       |
//! |--------------|-----------------------------------------|-----------------------|
//! | [`PushFeed`] | committed documents on the `OrderBus`   | its own filtered view |
//! | [`PollFeed`] | fixed interval, or a same-device signal | a fresh store query   |
//!
//! Consumers see the same contract from both: an initial snapshot of every
//! matching order reported as `Added`, then one snapshot per observable
//! change, each carrying the full list and the diff. When the read at
//! subscribe time fails, the initial snapshot arrives later with
//! `late_start` set.

pub mod cache;
pub mod poll;
pub mod push;

pub use cache::SnapshotCache;
pub use poll::PollFeed;
pub use push::PushFeed;

use crate::core::{Config, FeedBackend};
use crate::orders::{ManagerError, OrdersManager};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::order::{Order, OrderChange, OrderFilter};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Buffered snapshots per subscription before the producer waits
const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("No restaurant scope")]
    TenantMissing,

    #[error("Feed closed")]
    Closed,
}

/// What the subscriber is for; picks the poll cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedPurpose {
    #[default]
    OrderList,
    Notifications,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    pub restaurant_id: String,
    pub filter: OrderFilter,
    pub purpose: FeedPurpose,
}

impl FeedRequest {
    pub fn new(restaurant_id: impl Into<String>, filter: OrderFilter) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            filter,
            purpose: FeedPurpose::OrderList,
        }
    }

    pub fn purpose(mut self, purpose: FeedPurpose) -> Self {
        self.purpose = purpose;
        self
    }
}

/// One delivery
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    /// Full filtered list, newest first
    pub orders: Vec<Order>,
    /// Changes since the previous delivery of this connection
    pub changes: Vec<OrderChange>,
    /// Non-decreasing within one subscription
    pub observed_at: DateTime<Utc>,
    /// First delivery of a subscription whose read at subscribe time failed;
    /// it may already hold orders written after `subscribe` returned
    pub late_start: bool,
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &'static str;

    /// Open a live subscription
    ///
    /// Fails only when the request has no restaurant scope. A restaurant the
    /// caller may not read yields one empty snapshot and nothing after.
    async fn subscribe(&self, request: FeedRequest) -> Result<FeedSubscription, FeedError>;
}

/// Pick the adapter named by the configuration
pub fn build_change_feed(config: &Config, manager: Arc<OrdersManager>) -> Arc<dyn ChangeFeed> {
    match config.feed_backend {
        FeedBackend::Push => Arc::new(PushFeed::new(manager)),
        FeedBackend::Poll => Arc::new(PollFeed::from_config(config, manager)),
    }
}

/// Resolve the subscription scope
///
/// Permission failures are not surfaced here; the adapter reports them as an
/// empty result.
pub(crate) fn resolve_scope(
    manager: &OrdersManager,
    restaurant_id: &str,
) -> Result<String, FeedError> {
    match manager.resolve_tenant(restaurant_id) {
        Ok(id) => Ok(id.to_string()),
        Err(ManagerError::TenantMissing) => Err(FeedError::TenantMissing),
        Err(_) => Ok(restaurant_id.trim().to_string()),
    }
}

/// Handle to a live subscription
///
/// Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct FeedSubscription {
    rx: mpsc::Receiver<FeedSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    /// Run `producer` on its own task, wired to a fresh sink
    pub(crate) fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(SnapshotSink) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let cancel = CancellationToken::new();
        let sink = SnapshotSink {
            tx,
            cancel: cancel.clone(),
            last_observed: None,
            late_start: false,
        };
        let task = tokio::spawn(producer(sink));
        Self {
            rx,
            cancel,
            task: Some(task),
        }
    }

    /// Next snapshot, or `None` once unsubscribed or the producer stops
    pub async fn next(&mut self) -> Option<FeedSnapshot> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            snapshot = self.rx.recv() => snapshot,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stop deliveries; idempotent
    pub fn unsubscribe(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Producer side of a subscription
#[derive(Debug)]
pub struct SnapshotSink {
    tx: mpsc::Sender<FeedSnapshot>,
    cancel: CancellationToken,
    last_observed: Option<DateTime<Utc>>,
    late_start: bool,
}

impl SnapshotSink {
    /// Flag the next delivery as a late initial snapshot
    pub(crate) fn mark_late_start(&mut self) {
        if self.last_observed.is_none() {
            self.late_start = true;
        }
    }

    /// Send one snapshot; `false` means the subscriber is gone
    pub async fn deliver(&mut self, orders: Vec<Order>, changes: Vec<OrderChange>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let now = shared::util::now_utc();
        let observed_at = match self.last_observed {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_observed = Some(observed_at);

        let snapshot = FeedSnapshot {
            orders,
            changes,
            observed_at,
            late_start: std::mem::take(&mut self.late_start),
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(snapshot) => sent.is_ok(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once the subscriber unsubscribes
    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }

    /// Report an unreadable restaurant as empty, then go quiet
    pub(crate) async fn deny(&mut self, restaurant_id: &str) {
        tracing::warn!(restaurant_id, "Subscription denied, delivering empty result");
        if self.deliver(Vec::new(), Vec::new()).await {
            self.cancelled().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_delivers_in_order() {
        let mut sub = FeedSubscription::spawn(|mut sink| async move {
            sink.deliver(vec![], vec![]).await;
            sink.deliver(vec![], vec![]).await;
        });

        let first = sub.next().await.unwrap();
        let second = sub.next().await.unwrap();
        assert!(second.observed_at >= first.observed_at);
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let mut sub = FeedSubscription::spawn(|mut sink| async move {
            loop {
                if !sink.deliver(vec![], vec![]).await {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        });

        assert!(sub.next().await.is_some());
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert!(sub.next().await.is_none());
        // Idempotent
        sub.unsubscribe();
    }

    #[tokio::test]
    async fn test_deliver_after_cancel_is_dropped() {
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let mut sink = SnapshotSink {
            tx,
            cancel: cancel.clone(),
            last_observed: None,
            late_start: false,
        };

        assert!(sink.deliver(vec![], vec![]).await);
        cancel.cancel();
        assert!(sink.is_cancelled());
        assert!(!sink.deliver(vec![], vec![]).await);

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_late_start_flags_first_delivery_only() {
        let mut sub = FeedSubscription::spawn(|mut sink| async move {
            sink.mark_late_start();
            sink.deliver(vec![], vec![]).await;
            sink.mark_late_start();
            sink.deliver(vec![], vec![]).await;
        });

        assert!(sub.next().await.unwrap().late_start);
        assert!(!sub.next().await.unwrap().late_start);
    }
}
