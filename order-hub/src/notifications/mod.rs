//! Role notifications
//!
//! - [`NotificationDispatcher`] - dedup state machine over feed snapshots
//! - [`NotificationService`] - opens role subscriptions on a [`ChangeFeed`](crate::feed::ChangeFeed)
//! - [`NotificationSubscription`] - the stream handed to a widget

pub mod dispatcher;
pub mod service;

pub use dispatcher::NotificationDispatcher;
pub use service::{NotificationService, NotificationSubscription};
pub use shared::order::{Notification, NotificationRole};
