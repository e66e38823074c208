use std::sync::{Arc, RwLock};

use {anyhow::Result, tracing::debug};

use fedlink_common::now_secs;

use crate::{binding::Binding, cache::BindingCache, records::BindingRecords};

/// Two-tier chat ↔ room mapping: read-through, write-through.
///
/// Every read checks the cache first and falls back to the durable records
/// on a miss; every mutation updates both tiers before returning. The cache
/// lock is a synchronous `RwLock` that is never held across an `.await`
/// point, so concurrent handlers observe each insert/evict atomically.
pub struct BindingStore {
    records: Arc<dyn BindingRecords>,
    cache: RwLock<BindingCache>,
}

impl BindingStore {
    pub fn new(records: Arc<dyn BindingRecords>) -> Self {
        Self {
            records,
            cache: RwLock::new(BindingCache::default()),
        }
    }

    /// Warm the cache from the durable records; called once at startup.
    /// Returns the number of active bindings loaded.
    pub async fn warm(&self) -> Result<usize> {
        let bindings = self.records.list_active().await?;
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.clear();
        for binding in &bindings {
            cache.insert(&binding.chat_id, &binding.room_id);
        }
        Ok(bindings.len())
    }

    /// Room bound to a chat. Cache hits never touch the durable store;
    /// misses query for an *active* record and populate both directions.
    pub async fn resolve_room(&self, chat_id: &str) -> Result<Option<String>> {
        let cached = {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            cache.room(chat_id)
        };
        if cached.is_some() {
            return Ok(cached);
        }

        match self.records.find_active_by_chat(chat_id).await? {
            Some(binding) => {
                let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
                cache.insert(&binding.chat_id, &binding.room_id);
                Ok(Some(binding.room_id))
            },
            None => Ok(None),
        }
    }

    /// Chat bound to a room; symmetric to [`resolve_room`](Self::resolve_room).
    pub async fn resolve_chat(&self, room_id: &str) -> Result<Option<String>> {
        let cached = {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            cache.chat(room_id)
        };
        if cached.is_some() {
            return Ok(cached);
        }

        match self.records.find_active_by_room(room_id).await? {
            Some(binding) => {
                let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
                cache.insert(&binding.chat_id, &binding.room_id);
                Ok(Some(binding.chat_id))
            },
            None => Ok(None),
        }
    }

    /// Bind a chat to a room, replacing any active binding either side had.
    ///
    /// A chat re-bound to a new room must leave no stale reverse entry for
    /// the old room, and a room taken over from another chat displaces that
    /// chat's binding in both tiers.
    pub async fn create(&self, chat_id: &str, room_id: &str) -> Result<Binding> {
        // Displace any other chat actively bound to this room.
        if let Some(other) = self.records.find_active_by_room(room_id).await?
            && other.chat_id != chat_id
        {
            debug!(
                room_id,
                displaced_chat = %other.chat_id,
                "room re-bound to a different chat"
            );
            self.records.deactivate(&other.chat_id).await?;
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache.evict_chat(&other.chat_id);
        }

        let binding = Binding::new(chat_id, room_id, now_secs());
        self.records.upsert_active(&binding).await?;
        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache.insert(chat_id, room_id);
        }

        // Read back so preserved counters are visible to the caller.
        match self.records.get(chat_id).await? {
            Some(stored) => Ok(stored),
            None => Ok(binding),
        }
    }

    /// Deactivate a chat's binding and evict both cache directions.
    /// The durable row is kept for audit and reconciliation. Returns whether
    /// a binding existed.
    pub async fn remove(&self, chat_id: &str) -> Result<bool> {
        let existed = self.records.deactivate(chat_id).await?;
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.evict_chat(chat_id);
        Ok(existed)
    }

    /// The durable row for a chat regardless of active state.
    pub async fn get(&self, chat_id: &str) -> Result<Option<Binding>> {
        self.records.get(chat_id).await
    }

    /// Every durable binding, active or not.
    pub async fn list_all(&self) -> Result<Vec<Binding>> {
        self.records.list_all().await
    }

    pub async fn list_active(&self) -> Result<Vec<Binding>> {
        self.records.list_active().await
    }

    /// Bump `message_count` / `last_used_at` after a successful relay.
    pub async fn record_use(&self, chat_id: &str) -> Result<()> {
        self.records.record_use(chat_id, now_secs()).await
    }

    /// Stamp `last_used_at` after a successful outbound delivery.
    pub async fn touch_used(&self, chat_id: &str) -> Result<()> {
        self.records.touch_used(chat_id, now_secs()).await
    }

    /// Flip the soft validity flag; never deactivates.
    pub async fn set_validity(&self, chat_id: &str, valid: bool) -> Result<()> {
        self.records.set_validity(chat_id, valid, now_secs()).await
    }

    /// Drop all cached entries. Diagnostic surface; the next resolve goes to
    /// the durable records.
    pub fn clear_cache(&self) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.clear();
    }

    /// Number of cached bindings.
    pub fn cached_len(&self) -> usize {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.len()
    }
}
