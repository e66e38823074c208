use {
    serde::{Deserialize, Serialize},
    std::time::{SystemTime, UNIX_EPOCH},
};

/// Who sent a federated message. `platform` is the loop-prevention key:
/// a relay adapter must never deliver a message whose platform tag matches
/// its own back into the chat it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedSender {
    pub user_id: String,
    pub display_name: String,
    pub platform: String,
}

/// The wire-neutral message shape exchanged with the federation registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedMessage {
    pub id: String,
    pub text: String,
    pub from: FederatedSender,
    pub sent_at: i64,
    pub room_id: String,
}

impl FederatedMessage {
    /// Build a new message with a fresh id and the current timestamp.
    pub fn new(text: impl Into<String>, from: FederatedSender, room_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            from,
            sent_at: now_secs(),
            room_id: room_id.into(),
        }
    }
}

/// Current unix time in seconds.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Current unix time in milliseconds (backoff arithmetic).
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
