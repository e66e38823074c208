//! Shared wire types and clock helpers used across all fedlink crates.

pub mod types;

pub use types::{FederatedMessage, FederatedSender, now_millis, now_secs};
