//! Bidirectional message relay between the external chat platform and the
//! federation: translation, routing, loop prevention, and the seams the
//! platform adapter and gateway plug into.

pub mod engine;
pub mod events;
pub mod format;
pub mod message_log;

pub use {
    engine::{
        ChatSender, FederationPort, InboundOutcome, InboundSender, MessageRelay, OutboundOutcome,
        RelayIdentity,
    },
    events::{RelayEvent, RelayEventSink},
    format::{format_for_chat, platform_emoji},
    message_log::{LoggedMessage, MessageLog},
};
