//! Poll adapter
//!
//! Re-runs the subscription's query on a fixed interval and delivers only
//! when the result differs from the previous delivery. A write signal for the
//! same restaurant triggers an immediate re-read, so writes made through this
//! process show up without waiting for the next tick.

use super::{ChangeFeed, FeedError, FeedPurpose, FeedRequest, FeedSubscription, SnapshotCache, SnapshotSink};
use crate::core::Config;
use crate::message::WriteSignal;
use crate::orders::{ManagerError, ManagerResult, OrdersManager};
use async_trait::async_trait;
use shared::order::{Order, OrderFilter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, MissedTickBehavior};

const DEFAULT_ORDER_INTERVAL: Duration = Duration::from_millis(1000);
const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct PollFeed {
    manager: Arc<OrdersManager>,
    order_interval: Duration,
    notify_interval: Duration,
}

impl PollFeed {
    pub fn new(manager: Arc<OrdersManager>) -> Self {
        Self {
            manager,
            order_interval: DEFAULT_ORDER_INTERVAL,
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
        }
    }

    pub fn from_config(config: &Config, manager: Arc<OrdersManager>) -> Self {
        Self::new(manager).with_intervals(config.order_poll_interval(), config.notify_poll_interval())
    }

    pub fn with_intervals(mut self, order_interval: Duration, notify_interval: Duration) -> Self {
        self.order_interval = order_interval.max(Duration::from_millis(1));
        self.notify_interval = notify_interval.max(Duration::from_millis(1));
        self
    }

    fn interval_for(&self, purpose: FeedPurpose) -> Duration {
        match purpose {
            FeedPurpose::OrderList => self.order_interval,
            FeedPurpose::Notifications => self.notify_interval,
        }
    }
}

#[async_trait]
impl ChangeFeed for PollFeed {
    fn name(&self) -> &'static str {
        "poll"
    }

    async fn subscribe(&self, request: FeedRequest) -> Result<FeedSubscription, FeedError> {
        let restaurant_id = super::resolve_scope(&self.manager, &request.restaurant_id)?;
        let period = self.interval_for(request.purpose);
        let manager = self.manager.clone();
        // Subscribe before the first read so no signal is missed
        let signals = manager.bus().subscribe_signals();

        tracing::debug!(
            restaurant_id = %restaurant_id,
            interval_ms = period.as_millis() as u64,
            purpose = ?request.purpose,
            "Poll subscription opened"
        );

        // The first read happens before returning, so the initial snapshot
        // reflects the store as of this call
        let initial = manager.query(&restaurant_id, &request.filter);

        Ok(FeedSubscription::spawn(move |sink| {
            poll_loop(manager, restaurant_id, request.filter, period, initial, signals, sink)
        }))
    }
}

async fn poll_loop(
    manager: Arc<OrdersManager>,
    restaurant_id: String,
    filter: OrderFilter,
    period: Duration,
    initial: ManagerResult<Vec<Order>>,
    mut signals: broadcast::Receiver<WriteSignal>,
    mut sink: SnapshotSink,
) {
    let mut cache = SnapshotCache::new();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut signals_open = true;
    if let Err(e) = &initial
        && !matches!(e, ManagerError::PermissionDenied(_))
    {
        sink.mark_late_start();
    }
    let mut pending = Some(initial);

    loop {
        let result = match pending.take() {
            Some(result) => result,
            None => {
                tokio::select! {
                    _ = sink.cancelled() => break,
                    _ = ticker.tick() => {}
                    signal = signals.recv(), if signals_open => match signal {
                        Ok(signal) if signal.restaurant_id != restaurant_id => continue,
                        Ok(signal) => {
                            tracing::trace!(restaurant_id = %restaurant_id, sequence = signal.sequence, "Write signal, re-reading");
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(restaurant_id = %restaurant_id, skipped, "Write signals lagged");
                        }
                        Err(RecvError::Closed) => {
                            signals_open = false;
                            continue;
                        }
                    },
                }
                manager.query(&restaurant_id, &filter)
            }
        };

        match result {
            Ok(orders) => {
                if let Some(changes) = cache.update(&orders)
                    && !sink.deliver(orders, changes).await
                {
                    break;
                }
            }
            Err(ManagerError::PermissionDenied(_)) => {
                sink.deny(&restaurant_id).await;
                break;
            }
            Err(e) => {
                tracing::warn!(restaurant_id = %restaurant_id, error = %e, "Poll query failed, retrying next tick");
            }
        }
    }

    tracing::debug!(restaurant_id = %restaurant_id, "Poll subscription closed");
}
