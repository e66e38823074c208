use {anyhow::Result, async_trait::async_trait, serde::Serialize};

use fedlink_common::FederatedMessage;

/// One durably recorded relayed message.
///
/// Messages are appended *before* the registry relay is attempted, so retry
/// exhaustion can never lose the original text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedMessage {
    /// Database row id; 0 before insertion.
    pub id: i64,
    pub room_id: String,
    pub message_id: String,
    pub platform: String,
    pub user_id: String,
    pub display_name: String,
    pub text: String,
    pub sent_at: i64,
}

impl LoggedMessage {
    pub fn from_message(message: &FederatedMessage) -> Self {
        Self {
            id: 0,
            room_id: message.room_id.clone(),
            message_id: message.id.clone(),
            platform: message.from.platform.clone(),
            user_id: message.from.user_id.clone(),
            display_name: message.from.display_name.clone(),
            text: message.text.clone(),
            sent_at: message.sent_at,
        }
    }

    /// Reconstruct the wire shape, for the history endpoint.
    pub fn to_message(&self) -> FederatedMessage {
        FederatedMessage {
            id: self.message_id.clone(),
            text: self.text.clone(),
            from: fedlink_common::FederatedSender {
                user_id: self.user_id.clone(),
                display_name: self.display_name.clone(),
                platform: self.platform.clone(),
            },
            sent_at: self.sent_at,
            room_id: self.room_id.clone(),
        }
    }
}

/// Durable history of relayed messages.
#[async_trait]
pub trait MessageLog: Send + Sync {
    async fn append(&self, entry: LoggedMessage) -> Result<()>;
    async fn list_since(
        &self,
        room_id: &str,
        since: Option<i64>,
        limit: u32,
    ) -> Result<Vec<LoggedMessage>>;
}
