//! Order Store
//!
//! - **manager**: OrdersManager, the single writer of orders (create, status
//!   transitions, queries, tenant policy)
//! - **storage**: redb persistence for orders, per-day counters and the
//!   commit sequence
//! - **numbering**: `<dayOfMonth><counter>` order numbers in the business timezone
//! - **money**: draft validation and total verification
//!
//! # Architecture
//!
//! ```text
//! create / update → OrdersManager → write txn → Storage (redb)
//!                          ↓
//!                      OrderBus (mutation + write signal)
//!                          ↓
//!                 ChangeFeed subscribers
//! ```

pub mod manager;
pub mod money;
pub mod numbering;
pub mod storage;

// Re-exports
pub use manager::{ManagerError, ManagerOptions, ManagerResult, OrdersManager};
pub use numbering::{BusinessDay, OrderNumber, OrderNumberGenerator};
pub use storage::{OrderStorage, SequencedOrders, StorageError, StorageResult};

// Re-export shared types for convenience
pub use shared::order::{
    CommandError, CreatedOrder, Order, OrderDraft, OrderErrorCode, OrderFilter, OrderItem,
    OrderStatus,
};
