use std::sync::Arc;

use {
    fedlink_relay::{MessageLog, MessageRelay},
    fedlink_retry::RetryOrchestrator,
};

use crate::events::BroadcastEventSink;

/// Shared handles behind every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<MessageRelay>,
    pub log: Arc<dyn MessageLog>,
    pub retry: Arc<RetryOrchestrator>,
    pub events: Arc<BroadcastEventSink>,
}
