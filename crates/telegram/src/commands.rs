use std::sync::Arc;

use {
    tracing::{debug, info, warn},
    uuid::Uuid,
};

use {
    fedlink_bindings::BindingStore,
    fedlink_federation::FederationClient,
    fedlink_relay::{MessageRelay, OutboundOutcome},
};

/// Bot commands recognized in chat text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join { room_id: String },
    Create { name: String },
    Rooms,
    Status,
    Leave,
    Help,
}

/// Parse a slash command out of message text. Handles the `/cmd@BotName`
/// form Telegram uses in group chats; a mention of a different bot is
/// ignored entirely.
pub fn parse_command(text: &str, bot_username: Option<&str>) -> Option<Command> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };

    let name = match head.split_once('@') {
        Some((name, mention)) => {
            if let Some(own) = bot_username
                && !mention.eq_ignore_ascii_case(own)
            {
                return None;
            }
            name
        },
        None => head,
    };

    match name.to_ascii_lowercase().as_str() {
        "join" if !args.is_empty() => Some(Command::Join {
            room_id: args.to_string(),
        }),
        "create" if !args.is_empty() => Some(Command::Create {
            name: args.to_string(),
        }),
        "rooms" => Some(Command::Rooms),
        "status" => Some(Command::Status),
        "leave" => Some(Command::Leave),
        "help" | "start" | "join" | "create" => Some(Command::Help),
        _ => None,
    }
}

/// Everything a command needs to act on a chat.
pub struct CommandContext {
    pub bindings: Arc<BindingStore>,
    pub federation: Arc<FederationClient>,
    pub relay: Arc<MessageRelay>,
}

impl CommandContext {
    /// Run a command for a chat and produce the reply text. Failures are
    /// folded into the reply rather than propagated; the polling loop never
    /// sees a command error.
    pub async fn execute(&self, chat_id: &str, command: Command) -> String {
        match command {
            Command::Join { room_id } => self.join(chat_id, &room_id).await,
            Command::Create { name } => self.create(chat_id, &name).await,
            Command::Rooms => self.rooms().await,
            Command::Status => self.status(chat_id).await,
            Command::Leave => self.leave(chat_id).await,
            Command::Help => help_text().to_string(),
        }
    }

    async fn join(&self, chat_id: &str, room_id: &str) -> String {
        // Prefer the registry's name for the room when it already exists.
        let name = match self.federation.list_rooms().await {
            Ok(rooms) => rooms
                .into_iter()
                .find(|r| r.room_id == room_id)
                .map(|r| r.name),
            Err(_) => None,
        };
        let name = name.unwrap_or_else(|| room_id.to_string());

        if let Err(e) = self.bindings.create(chat_id, room_id).await {
            return format!("⚠️ Could not join room: {e}");
        }
        if let Err(e) = self.federation.announce_room(room_id, &name).await {
            return format!("⚠️ Joined locally, but the registry is unreachable: {e}");
        }
        info!(chat_id, room_id, "chat joined room");

        let mut reply = format!("✅ This chat is now bound to room \"{name}\" ({room_id}).");
        let backfilled = self.backfill_history(room_id).await;
        if backfilled > 0 {
            reply.push_str(&format!(" Backfilled {backfilled} recent message(s)."));
        }
        reply
    }

    /// Pull recent history from the room's peers into the freshly bound
    /// chat. Best-effort: a dead peer or an unreachable registry only costs
    /// the backfill, never the join.
    async fn backfill_history(&self, room_id: &str) -> usize {
        let peers = match self.federation.room_peers(room_id).await {
            Ok(peers) => peers,
            Err(e) => {
                debug!(room_id, error = %e, "could not discover peers for backfill");
                return 0;
            },
        };

        let mut delivered = 0usize;
        for peer in peers {
            let messages = match self
                .federation
                .peer_messages(&peer.url, room_id, None)
                .await
            {
                Ok(messages) => messages,
                Err(e) => {
                    debug!(room_id, peer = %peer.url, error = %e, "peer backfill fetch failed");
                    continue;
                },
            };
            for message in &messages {
                // Loop prevention also filters our own history out of the
                // backfill.
                match self.relay.relay_outbound(room_id, message).await {
                    Ok(OutboundOutcome::Delivered { .. }) => delivered += 1,
                    Ok(_) => {},
                    Err(e) => {
                        warn!(room_id, error = %e, "backfill delivery failed");
                        return delivered;
                    },
                }
            }
        }
        if delivered > 0 {
            info!(room_id, delivered, "backfilled room history from peers");
        }
        delivered
    }

    async fn create(&self, chat_id: &str, name: &str) -> String {
        let room_id = Uuid::new_v4().to_string();
        if let Err(e) = self.bindings.create(chat_id, &room_id).await {
            return format!("⚠️ Could not create room: {e}");
        }
        if let Err(e) = self.federation.announce_room(&room_id, name).await {
            return format!("⚠️ Room created locally, but the registry is unreachable: {e}");
        }
        info!(chat_id, room_id, name, "room created and announced");
        format!("✅ Created room \"{name}\" ({room_id}) and bound this chat to it.")
    }

    async fn rooms(&self) -> String {
        match self.federation.list_rooms().await {
            Ok(rooms) if rooms.is_empty() => "No federated rooms yet. Use /create <name>.".into(),
            Ok(rooms) => {
                let mut out = String::from("Federated rooms:\n");
                for room in rooms {
                    out.push_str(&format!(
                        "• {} ({}) — {} peer(s)\n",
                        room.name, room.room_id, room.peer_count
                    ));
                }
                out
            },
            Err(e) => format!("⚠️ Could not reach the registry: {e}"),
        }
    }

    async fn status(&self, chat_id: &str) -> String {
        match self.bindings.get(chat_id).await {
            Ok(Some(b)) if b.is_active => {
                let health = if b.is_valid { "healthy" } else { "needs attention" };
                format!(
                    "Bound to room {} ({health}), {} message(s) relayed.",
                    b.room_id, b.message_count
                )
            },
            Ok(_) => "This chat is not bound to any room. Use /join <roomId> or /create <name>."
                .into(),
            Err(e) => format!("⚠️ Could not read binding: {e}"),
        }
    }

    async fn leave(&self, chat_id: &str) -> String {
        match self.bindings.remove(chat_id).await {
            Ok(true) => {
                info!(chat_id, "chat left its room");
                "✅ This chat is no longer bound to a room.".into()
            },
            Ok(false) => "This chat was not bound to a room.".into(),
            Err(e) => format!("⚠️ Could not leave room: {e}"),
        }
    }
}

fn help_text() -> &'static str {
    "Fedlink bridges this chat into a federated room network.\n\
     /join <roomId> — bind this chat to an existing room\n\
     /create <name> — create a new room and bind this chat to it\n\
     /rooms — list federated rooms\n\
     /status — show this chat's binding\n\
     /leave — unbind this chat\n\
     /help — this message"
}
