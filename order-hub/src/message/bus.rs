//! 进程内订单总线
//!
//! # 架构
//!
//! ```text
//! OrdersManager ──commit──▶ OrderBus::publish()
//!                               │
//!               ┌───────────────┴───────────────┐
//!               ▼                               ▼
//!   mutation_tx (full document)        signal_tx (tenant only)
//!               │                               │
//!           PushFeed                        PollFeed
//!  (applies documents to its view)   (re-reads the store early)
//! ```
//!
//! Both channels are `tokio::sync::broadcast`; a slow subscriber lags rather
//! than blocking the writer.

use shared::order::Order;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default capacity of each channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A committed write
#[derive(Debug, Clone, PartialEq)]
pub struct OrderMutation {
    /// Global commit sequence of the write
    pub sequence: u64,
    pub restaurant_id: String,
    /// Document as committed
    pub order: Order,
}

/// "Something changed for this restaurant" (same-device write signal)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSignal {
    pub restaurant_id: String,
    pub sequence: u64,
}

#[derive(Debug, Clone)]
pub struct OrderBus {
    mutation_tx: broadcast::Sender<Arc<OrderMutation>>,
    signal_tx: broadcast::Sender<WriteSignal>,
}

impl OrderBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (mutation_tx, _) = broadcast::channel(capacity);
        let (signal_tx, _) = broadcast::channel(capacity);
        Self {
            mutation_tx,
            signal_tx,
        }
    }

    /// Publish a committed write to both channels
    ///
    /// Having no subscribers is normal and not an error.
    pub fn publish(&self, sequence: u64, order: &Order) {
        let mutation = Arc::new(OrderMutation {
            sequence,
            restaurant_id: order.restaurant_id.clone(),
            order: order.clone(),
        });
        if self.mutation_tx.send(mutation).is_err() {
            tracing::trace!(sequence, "No push subscribers");
        }

        let signal = WriteSignal {
            restaurant_id: order.restaurant_id.clone(),
            sequence,
        };
        if self.signal_tx.send(signal).is_err() {
            tracing::trace!(sequence, "No poll subscribers");
        }
    }

    /// Subscribe to committed documents (push transport)
    pub fn subscribe_mutations(&self) -> broadcast::Receiver<Arc<OrderMutation>> {
        self.mutation_tx.subscribe()
    }

    /// Subscribe to write signals (poll wake-up)
    pub fn subscribe_signals(&self) -> broadcast::Receiver<WriteSignal> {
        self.signal_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.mutation_tx.receiver_count() + self.signal_tx.receiver_count()
    }
}

impl Default for OrderBus {
    fn default() -> Self {
        Self::new()
    }
}
