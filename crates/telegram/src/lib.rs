//! Telegram adapter for fedlink.
//!
//! Uses teloxide to receive chat events via long polling and to send
//! federated messages back into bound chats. The command surface
//! (`/join`, `/create`, `/rooms`, `/status`, `/leave`) is a thin layer over
//! the binding store and the federation client.

pub mod bot;
pub mod commands;
pub mod config;
pub mod outbound;
pub mod probe;

pub use {
    bot::{connect, start_polling},
    commands::CommandContext,
    config::TelegramConfig,
    outbound::TelegramSender,
    probe::TelegramChatProbe,
};
