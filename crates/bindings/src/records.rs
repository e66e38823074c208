use {anyhow::Result, async_trait::async_trait};

use crate::binding::Binding;

/// The durable half of the binding store.
///
/// Implementations persist bindings across process restarts; the cache in
/// [`crate::store::BindingStore`] is rebuilt from here. `deactivate` and
/// `set_validity` never delete rows.
#[async_trait]
pub trait BindingRecords: Send + Sync {
    /// Active binding for a chat, if any.
    async fn find_active_by_chat(&self, chat_id: &str) -> Result<Option<Binding>>;

    /// Active binding for a room, if any.
    async fn find_active_by_room(&self, room_id: &str) -> Result<Option<Binding>>;

    /// The row for a chat regardless of active state.
    async fn get(&self, chat_id: &str) -> Result<Option<Binding>>;

    /// Insert or reactivate a binding. On conflict the existing row keeps
    /// its `created_at` and `message_count`.
    async fn upsert_active(&self, binding: &Binding) -> Result<()>;

    /// Flip `is_active` off; returns whether a row was affected.
    async fn deactivate(&self, chat_id: &str) -> Result<bool>;

    async fn list_active(&self) -> Result<Vec<Binding>>;

    /// Every row, active or not (reconciliation walks all of them).
    async fn list_all(&self) -> Result<Vec<Binding>>;

    /// Increment `message_count` and stamp `last_used_at`.
    async fn record_use(&self, chat_id: &str, now: i64) -> Result<()>;

    /// Stamp `last_used_at` only.
    async fn touch_used(&self, chat_id: &str, now: i64) -> Result<()>;

    /// Set the soft validity flag and stamp `last_validated_at`.
    async fn set_validity(&self, chat_id: &str, valid: bool, now: i64) -> Result<()>;
}
