use {
    async_trait::async_trait,
    tokio::sync::broadcast,
    tracing::debug,
};

use fedlink_relay::{RelayEvent, RelayEventSink};

/// Fan-out of relay events to in-process subscribers over a broadcast
/// channel. Emission never blocks and never fails; with no subscribers the
/// event is dropped.
pub struct BroadcastEventSink {
    tx: broadcast::Sender<RelayEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl RelayEventSink for BroadcastEventSink {
    async fn emit(&self, event: RelayEvent) {
        if self.tx.send(event).is_err() {
            debug!("relay event dropped, no subscribers");
        }
    }
}
