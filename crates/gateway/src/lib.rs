//! HTTP surface of the adapter: the inbound relay endpoints peers and the
//! registry call, message history, retry administration, and the broadcast
//! event fan-out.

pub mod events;
pub mod message_log_store;
pub mod server;
pub mod state;

pub use {
    events::BroadcastEventSink,
    message_log_store::SqliteMessageLog,
    server::{build_app, serve},
    state::AppState,
};
