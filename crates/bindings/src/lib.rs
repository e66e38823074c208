//! Chat-to-room bindings: the durable record, its read-through cache, and
//! background validity reconciliation.
//!
//! The durable store is the source of truth; the in-memory cache is a
//! strictly derived pair of lookup maps that exists only to avoid a durable
//! round-trip on every inbound message. Every mutation updates both tiers
//! synchronously.

pub mod binding;
pub mod cache;
pub mod records;
pub mod sqlite;
pub mod store;
pub mod validator;

pub use {
    binding::Binding,
    records::BindingRecords,
    sqlite::SqliteBindingRecords,
    store::BindingStore,
    validator::{BindingValidator, ChatProbe, ValidationSummary},
};
