//! Shared types for the order hub
//!
//! Wire-level order types, the status state machine, feed snapshot shapes and
//! the error-code taxonomy used across crates.

pub mod order;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
