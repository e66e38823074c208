use std::collections::HashMap;

/// Volatile forward/reverse lookup maps over active bindings.
///
/// Strictly derived from the durable records: rebuilt at startup, lazily
/// populated on misses, and never the sole record of a write. Because the
/// two directions are stored independently, [`insert`](Self::insert) must
/// evict the stale mirror entries itself when a chat or room is re-bound.
#[derive(Debug, Default)]
pub struct BindingCache {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

impl BindingCache {
    pub fn room(&self, chat_id: &str) -> Option<String> {
        self.forward.get(chat_id).cloned()
    }

    pub fn chat(&self, room_id: &str) -> Option<String> {
        self.reverse.get(room_id).cloned()
    }

    /// Write both directions, evicting whatever the chat or room previously
    /// pointed at so no stale mirror entry survives.
    pub fn insert(&mut self, chat_id: &str, room_id: &str) {
        if let Some(old_room) = self.forward.insert(chat_id.to_string(), room_id.to_string())
            && old_room != room_id
        {
            self.reverse.remove(&old_room);
        }
        if let Some(old_chat) = self.reverse.insert(room_id.to_string(), chat_id.to_string())
            && old_chat != chat_id
        {
            self.forward.remove(&old_chat);
        }
    }

    /// Drop both directions for a chat.
    pub fn evict_chat(&mut self, chat_id: &str) {
        if let Some(room) = self.forward.remove(chat_id) {
            self.reverse.remove(&room);
        }
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
