//! In-process message bus
//!
//! Carries committed order writes from the store to change feeds.

pub mod bus;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, OrderBus, OrderMutation, WriteSignal};
