use std::sync::Arc;

use {
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, MediaKind, Message, MessageKind, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use fedlink_relay::{InboundSender, MessageRelay};

use crate::{
    commands::{self, CommandContext},
    config::TelegramConfig,
};

/// Build the bot from config and verify credentials.
///
/// The HTTP client timeout is longer than the long-polling timeout (30s)
/// so the client doesn't abort the request before Telegram responds.
pub async fn connect(config: &TelegramConfig) -> anyhow::Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(std::time::Duration::from_secs(45))
        .build()?;
    Ok(Bot::with_client(config.token.expose_secret(), client))
}

/// Start the manual long-polling loop.
///
/// Spawns a background task that dispatches slash commands to the command
/// surface and plain text into the relay, until `cancel` fires.
pub async fn start_polling(
    bot: Bot,
    commands: Arc<CommandContext>,
    relay: Arc<MessageRelay>,
    cancel: CancellationToken,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let me = bot.get_me().await?;
    let bot_username = me.username.clone();

    // Long polling requires no webhook to be set.
    bot.delete_webhook().send().await?;

    let bot_commands = vec![
        BotCommand::new("join", "Bind this chat to an existing room"),
        BotCommand::new("create", "Create a new room and bind this chat"),
        BotCommand::new("rooms", "List federated rooms"),
        BotCommand::new("status", "Show this chat's binding"),
        BotCommand::new("leave", "Unbind this chat"),
        BotCommand::new("help", "Show available commands"),
    ];
    if let Err(e) = bot.set_my_commands(bot_commands).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(username = ?bot_username, "telegram bot connected (webhook cleared)");

    let handle = tokio::spawn(async move {
        info!("starting telegram manual polling loop");
        let mut offset: i32 = 0;

        loop {
            if cancel.is_cancelled() {
                info!("telegram polling stopped");
                break;
            }

            let result = bot
                .get_updates()
                .offset(offset)
                .timeout(30)
                .allowed_updates(vec![AllowedUpdate::Message])
                .await;

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        match update.kind {
                            UpdateKind::Message(msg) => {
                                if let Err(e) = handle_message(
                                    &bot,
                                    bot_username.as_deref(),
                                    &commands,
                                    &relay,
                                    msg,
                                )
                                .await
                                {
                                    error!(error = %e, "error handling telegram message");
                                }
                            },
                            other => {
                                debug!("ignoring non-message update: {other:?}");
                            },
                        }
                    }
                },
                Err(e) => {
                    // Another instance polling with the same token is fatal
                    // for this loop; anything else gets a backoff and retry.
                    if matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) {
                        error!(
                            "telegram polling stopped: another instance is already running \
                             with this token"
                        );
                        cancel.cancel();
                        break;
                    }

                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                },
            }
        }
    });

    Ok(handle)
}

async fn handle_message(
    bot: &Bot,
    bot_username: Option<&str>,
    commands: &CommandContext,
    relay: &MessageRelay,
    msg: Message,
) -> anyhow::Result<()> {
    let Some(text) = extract_text(&msg) else {
        debug!(chat_id = msg.chat.id.0, "ignoring non-text message");
        return Ok(());
    };
    let chat_id = msg.chat.id.0.to_string();

    if let Some(command) = commands::parse_command(&text, bot_username) {
        debug!(chat_id, ?command, "dispatching command");
        let reply = commands.execute(&chat_id, command).await;
        bot.send_message(msg.chat.id, reply).await?;
        return Ok(());
    }

    let Some(from) = msg.from.as_ref() else {
        debug!(chat_id, "ignoring message without a sender");
        return Ok(());
    };
    let sender = InboundSender {
        user_id: from.id.0.to_string(),
        display_name: display_name(from),
    };

    let outcome = relay.relay_inbound(&chat_id, &sender, &text).await?;
    debug!(chat_id, ?outcome, "inbound message handled");
    Ok(())
}

fn extract_text(msg: &Message) -> Option<String> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(media) => Some(media.text.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn display_name(user: &teloxide::types::User) -> String {
    let first = &user.first_name;
    let last = user.last_name.as_deref().unwrap_or("");
    let name = format!("{first} {last}").trim().to_string();
    if name.is_empty() {
        user.username.clone().unwrap_or_else(|| user.id.0.to_string())
    } else {
        name
    }
}
