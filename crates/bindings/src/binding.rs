use serde::Serialize;

/// One chat-to-room association.
///
/// At most one *active* binding exists per chat id, and at most one per room
/// id for this adapter. Deactivation flips `is_active` and keeps the row;
/// failed reconciliation flips `is_valid` and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub chat_id: String,
    pub room_id: String,
    pub is_active: bool,
    /// Soft flag set by the last reconciliation pass. Informational only:
    /// outbound sends are still attempted while invalid.
    pub is_valid: bool,
    pub message_count: i64,
    pub last_used_at: i64,
    pub last_validated_at: Option<i64>,
    pub created_at: i64,
}

impl Binding {
    /// Fresh active binding, presumed valid until reconciliation says
    /// otherwise.
    pub fn new(chat_id: impl Into<String>, room_id: impl Into<String>, now: i64) -> Self {
        Self {
            chat_id: chat_id.into(),
            room_id: room_id.into(),
            is_active: true,
            is_valid: true,
            message_count: 0,
            last_used_at: now,
            last_validated_at: None,
            created_at: now,
        }
    }
}
