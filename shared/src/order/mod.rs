//! Order Lifecycle Types
//!
//! This module provides the wire-level types shared by the order hub and its
//! consumers (dashboards, kitchen display, waiter handhelds):
//! - Orders: the persisted document and the draft used to create it
//! - Status: the lifecycle state machine
//! - Snapshots: filters and diffs delivered by change feeds
//! - Notifications: role-specific alerts derived from the feed

pub mod notification;
pub mod snapshot;
pub mod status;
pub mod types;

// Re-exports
pub use notification::{Notification, NotificationRole};
pub use snapshot::{ChangeKind, OrderChange, OrderFilter, newest_first};
pub use status::{OrderStatus, TransitionError};
pub use types::*;
