use {async_trait::async_trait, serde::Serialize};

use fedlink_common::FederatedMessage;

/// Events produced for real-time subscribers (web UI, peers).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RelayEvent {
    NewMessage {
        room_id: String,
        message: FederatedMessage,
        timestamp: i64,
    },
}

/// Sink for relay events — the gateway provides the concrete
/// implementation (a broadcast channel). Emission is fire-and-forget.
#[async_trait]
pub trait RelayEventSink: Send + Sync {
    async fn emit(&self, event: RelayEvent);
}
