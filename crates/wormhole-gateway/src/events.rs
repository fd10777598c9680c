//! Turns raw gateway dispatches into relay events.
//!
//! Update and delete dispatches only carry ids (and, for updates, the changed
//! fields), while the relay needs the full message to fingerprint it. Recent
//! messages are therefore kept in a bounded cache; updates and deletes of
//! messages that fell out of it, or were never seen, are dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use wormhole_common::ids::MessageId;
use wormhole_common::models::Message;

use crate::error::Result;
use crate::gateway::GatewayEvent;
use crate::types::{WireMessage, WireMessageDelete, WireMessageDeleteBulk, WireMessageUpdate};

/// A platform event the relay acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Created(Message),
    Updated { before: Message, after: Message },
    Deleted(Message),
}

/// Insertion-ordered message cache holding at most `capacity` entries.
#[derive(Debug)]
pub struct MessageCache {
    capacity: usize,
    order: VecDeque<MessageId>,
    messages: HashMap<MessageId, Message>,
}

impl MessageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            messages: HashMap::new(),
        }
    }

    /// Insert or replace. Replacing keeps the original position.
    pub fn insert(&mut self, message: Message) {
        if self.capacity == 0 {
            return;
        }
        if self.messages.insert(message.id, message.clone()).is_none() {
            self.order.push_back(message.id);
        }
        while self.messages.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.messages.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.get(&id)
    }

    pub fn remove(&mut self, id: MessageId) -> Option<Message> {
        let removed = self.messages.remove(&id)?;
        self.order.retain(|m| *m != id);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

pub struct EventTranslator {
    cdn_url: String,
    cache: Mutex<MessageCache>,
}

impl EventTranslator {
    pub fn new(cdn_url: impl Into<String>, cache_size: usize) -> Self {
        Self {
            cdn_url: cdn_url.into(),
            cache: Mutex::new(MessageCache::new(cache_size)),
        }
    }

    fn with_cache<T>(&self, f: impl FnOnce(&mut MessageCache) -> T) -> T {
        // A poisoned cache only ever holds stale messages; keep using it
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut cache)
    }

    /// Translate one dispatch. Unrelated dispatches yield nothing.
    pub fn translate(&self, event: &GatewayEvent) -> Result<Vec<RelayEvent>> {
        match event.name() {
            Some("MESSAGE_CREATE") => {
                let wire: WireMessage = serde_json::from_value(event.data.clone())?;
                let message = wire.into_model(None, &self.cdn_url);
                self.with_cache(|c| c.insert(message.clone()));
                Ok(vec![RelayEvent::Created(message)])
            }
            Some("MESSAGE_UPDATE") => {
                let update: WireMessageUpdate = serde_json::from_value(event.data.clone())?;
                let id = update.id;
                let translated = self.with_cache(|c| {
                    let before = c.get(id)?.clone();
                    let after = update.apply(&before);
                    c.insert(after.clone());
                    Some(RelayEvent::Updated { before, after })
                });
                if translated.is_none() {
                    tracing::debug!(message_id = %id, "Update of uncached message ignored");
                }
                Ok(translated.into_iter().collect())
            }
            Some("MESSAGE_DELETE") => {
                let delete: WireMessageDelete = serde_json::from_value(event.data.clone())?;
                Ok(self.deleted(&[delete.id], delete.channel_id.get()))
            }
            Some("MESSAGE_DELETE_BULK") => {
                let bulk: WireMessageDeleteBulk = serde_json::from_value(event.data.clone())?;
                Ok(self.deleted(&bulk.ids, bulk.channel_id.get()))
            }
            _ => Ok(Vec::new()),
        }
    }

    fn deleted(&self, ids: &[MessageId], channel_id: u64) -> Vec<RelayEvent> {
        self.with_cache(|c| {
            ids.iter()
                .filter_map(|id| {
                    let cached = c.remove(*id);
                    if cached.is_none() {
                        tracing::debug!(message_id = %id, channel_id, "Delete of uncached message ignored");
                    }
                    cached.map(RelayEvent::Deleted)
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn dispatch(name: &str, data: Value) -> GatewayEvent {
        GatewayEvent {
            event: Some(name.into()),
            data,
        }
    }

    fn create(id: u64, content: &str) -> GatewayEvent {
        dispatch(
            "MESSAGE_CREATE",
            json!({
                "id": id.to_string(),
                "channel_id": "20",
                "guild_id": "1",
                "author": { "id": "300", "username": "ayla" },
                "content": content,
                "timestamp": "2024-06-01T12:00:00+00:00"
            }),
        )
    }

    #[test]
    fn cache_evicts_oldest() {
        let translator = EventTranslator::new("https://cdn.example", 2);
        for id in 1..=3 {
            translator.translate(&create(id, "hi")).unwrap();
        }
        translator.with_cache(|c| {
            assert_eq!(c.len(), 2);
            assert!(c.get(MessageId(1)).is_none());
            assert!(c.get(MessageId(3)).is_some());
        });
    }

    #[test]
    fn update_carries_before_and_after() {
        let translator = EventTranslator::new("https://cdn.example", 10);
        translator.translate(&create(1, "helo")).unwrap();

        let events = translator
            .translate(&dispatch(
                "MESSAGE_UPDATE",
                json!({ "id": "1", "channel_id": "20", "content": "hello" }),
            ))
            .unwrap();
        let [RelayEvent::Updated { before, after }] = events.as_slice() else {
            panic!("expected one update, got {events:?}");
        };
        assert_eq!(before.content, "helo");
        assert_eq!(after.content, "hello");
        assert_eq!(after.author.display_name, "ayla");

        // A second edit starts from the updated content
        let events = translator
            .translate(&dispatch(
                "MESSAGE_UPDATE",
                json!({ "id": "1", "channel_id": "20", "content": "hello!" }),
            ))
            .unwrap();
        assert!(matches!(&events[0], RelayEvent::Updated { before, .. } if before.content == "hello"));
    }

    #[test]
    fn uncached_updates_and_deletes_are_dropped() {
        let translator = EventTranslator::new("https://cdn.example", 10);
        let update = dispatch("MESSAGE_UPDATE", json!({ "id": "9", "channel_id": "20", "content": "x" }));
        let delete = dispatch("MESSAGE_DELETE", json!({ "id": "9", "channel_id": "20" }));
        assert!(translator.translate(&update).unwrap().is_empty());
        assert!(translator.translate(&delete).unwrap().is_empty());
    }

    #[test]
    fn delete_returns_cached_message_once() {
        let translator = EventTranslator::new("https://cdn.example", 10);
        translator.translate(&create(1, "bye")).unwrap();
        translator.translate(&create(2, "bye too")).unwrap();

        let bulk = dispatch(
            "MESSAGE_DELETE_BULK",
            json!({ "ids": ["1", "2", "3"], "channel_id": "20" }),
        );
        let events = translator.translate(&bulk).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], RelayEvent::Deleted(m) if m.content == "bye"));

        assert!(translator.translate(&bulk).unwrap().is_empty());
    }

    #[test]
    fn other_dispatches_are_ignored() {
        let translator = EventTranslator::new("https://cdn.example", 10);
        let typing = dispatch("TYPING_START", json!({ "channel_id": "20" }));
        assert!(translator.translate(&typing).unwrap().is_empty());
    }
}
