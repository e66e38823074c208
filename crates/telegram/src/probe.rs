use {
    async_trait::async_trait,
    teloxide::{prelude::*, types::ChatId},
};

use fedlink_bindings::ChatProbe;

/// Existence check used by binding reconciliation: `get_chat` succeeds only
/// while the bot can still see the chat.
pub struct TelegramChatProbe {
    bot: Bot,
}

impl TelegramChatProbe {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatProbe for TelegramChatProbe {
    async fn probe_chat(&self, chat_id: &str) -> anyhow::Result<()> {
        let chat = ChatId(chat_id.parse::<i64>()?);
        self.bot.get_chat(chat).await?;
        Ok(())
    }
}
