use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    tracing::{debug, info, warn},
};

use {
    fedlink_bindings::BindingStore,
    fedlink_common::{FederatedMessage, FederatedSender, now_secs},
    fedlink_federation::FederationClient,
};

use crate::{
    events::{RelayEvent, RelayEventSink},
    format,
    message_log::{LoggedMessage, MessageLog},
};

/// The send primitive of the external chat platform.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()>;
}

/// The slice of the registry client the relay engine needs. Kept as a trait
/// so the engine can be exercised without a live registry.
#[async_trait]
pub trait FederationPort: Send + Sync {
    async fn relay_message(&self, room_id: &str, message: &FederatedMessage) -> Result<()>;
}

#[async_trait]
impl FederationPort for FederationClient {
    async fn relay_message(&self, room_id: &str, message: &FederatedMessage) -> Result<()> {
        FederationClient::relay_message(self, room_id, message).await?;
        Ok(())
    }
}

/// This adapter's platform tag plus a designated alias. Both count as "own"
/// for loop prevention.
#[derive(Debug, Clone)]
pub struct RelayIdentity {
    pub platform: String,
    pub alias: Option<String>,
}

impl RelayIdentity {
    pub fn new(platform: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            platform: platform.into(),
            alias,
        }
    }

    pub fn telegram() -> Self {
        Self::new("telegram", Some("telegram-bot".into()))
    }

    /// Would relaying a message with this platform tag bounce back to us?
    pub fn is_own(&self, platform: &str) -> bool {
        platform == self.platform || self.alias.as_deref() == Some(platform)
    }
}

/// Who sent an inbound chat message.
#[derive(Debug, Clone)]
pub struct InboundSender {
    pub user_id: String,
    pub display_name: String,
}

/// What happened to an inbound chat event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    Relayed { room_id: String },
    /// The chat is not bound to any room; the event is dropped.
    NotBound,
}

/// What happened to a federated message headed for the chat. `LoopSkipped`
/// and `NotBound` are deliberately distinct: "intentionally not sending" vs
/// "nowhere to send".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundOutcome {
    Delivered { chat_id: String },
    LoopSkipped,
    NotBound,
}

/// Bidirectional translation and routing between the external chat and the
/// federation. Both directions are idempotent with respect to reprocessing
/// the same chat event; exactly-once transport is not assumed.
pub struct MessageRelay {
    identity: RelayIdentity,
    bindings: Arc<BindingStore>,
    federation: Arc<dyn FederationPort>,
    sender: Arc<dyn ChatSender>,
    log: Arc<dyn MessageLog>,
    events: Option<Arc<dyn RelayEventSink>>,
}

impl MessageRelay {
    pub fn new(
        identity: RelayIdentity,
        bindings: Arc<BindingStore>,
        federation: Arc<dyn FederationPort>,
        sender: Arc<dyn ChatSender>,
        log: Arc<dyn MessageLog>,
    ) -> Self {
        Self {
            identity,
            bindings,
            federation,
            sender,
            log,
            events: None,
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn RelayEventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn identity(&self) -> &RelayIdentity {
        &self.identity
    }

    /// Inbound: a plain-text chat event (commands never reach here) becomes
    /// a federated message. The message is durably logged before the relay
    /// is attempted; usage bookkeeping afterwards is best-effort.
    pub async fn relay_inbound(
        &self,
        chat_id: &str,
        sender: &InboundSender,
        text: &str,
    ) -> Result<InboundOutcome> {
        let Some(room_id) = self.bindings.resolve_room(chat_id).await? else {
            debug!(chat_id, "chat not bound to any room, dropping message");
            return Ok(InboundOutcome::NotBound);
        };

        let message = FederatedMessage::new(
            text,
            FederatedSender {
                user_id: sender.user_id.clone(),
                display_name: sender.display_name.clone(),
                platform: self.identity.platform.clone(),
            },
            room_id.clone(),
        );

        self.log.append(LoggedMessage::from_message(&message)).await?;
        self.federation.relay_message(&room_id, &message).await?;

        if let Err(e) = self.bindings.record_use(chat_id).await {
            warn!(chat_id, error = %e, "failed to update binding usage");
        }
        self.emit_new_message(&room_id, message).await;

        info!(chat_id, room_id, "relayed chat message to federation");
        Ok(InboundOutcome::Relayed { room_id })
    }

    /// Outbound with loop prevention: a message that originated on this
    /// platform is skipped, everything else goes through
    /// [`deliver_to_chat`](Self::deliver_to_chat).
    pub async fn relay_outbound(
        &self,
        room_id: &str,
        message: &FederatedMessage,
    ) -> Result<OutboundOutcome> {
        if self.identity.is_own(&message.from.platform) {
            debug!(
                room_id,
                platform = %message.from.platform,
                "skipping message that originated on this platform"
            );
            return Ok(OutboundOutcome::LoopSkipped);
        }
        self.deliver_to_chat(room_id, message).await
    }

    /// Format a federated message and push it into the bound chat. Usage
    /// bookkeeping afterwards is best-effort.
    pub async fn deliver_to_chat(
        &self,
        room_id: &str,
        message: &FederatedMessage,
    ) -> Result<OutboundOutcome> {
        let Some(chat_id) = self.bindings.resolve_chat(room_id).await? else {
            debug!(room_id, "no local chat bound to room, dropping relay");
            return Ok(OutboundOutcome::NotBound);
        };

        let text = format::format_for_chat(message);
        self.sender.send_text(&chat_id, &text).await?;

        if let Err(e) = self.bindings.touch_used(&chat_id).await {
            warn!(chat_id, error = %e, "failed to update binding usage");
        }

        info!(room_id, chat_id, "delivered federated message to chat");
        Ok(OutboundOutcome::Delivered { chat_id })
    }

    async fn emit_new_message(&self, room_id: &str, message: FederatedMessage) {
        if let Some(sink) = &self.events {
            sink.emit(RelayEvent::NewMessage {
                room_id: room_id.to_string(),
                message,
                timestamp: now_secs(),
            })
            .await;
        }
    }
}
