use chrono::Utc;
use serde_json::{Map, Value};

use super::{decode, encode, read_log, update_value, Store, StoreError};
use crate::models::chat::{ChatMessage, NewChatMessage};
use crate::utils;

/// Global support chat. Messages are tagged with the account they belong to;
/// `None` is the bucket for anonymous visitors.
#[derive(Clone)]
pub struct ChatRepository {
    store: Store,
}

impl ChatRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn messages(&self) -> Result<Vec<ChatMessage>, StoreError> {
        read_log(&self.store.chat)
    }

    pub fn send(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError> {
        let attachment = message
            .attachment
            .filter(|a| !a.name.is_empty() && !a.data_url.is_empty());

        if message.text.trim().is_empty() && attachment.is_none() {
            return Err(StoreError::ValidationFailed(
                "Message needs text or an attachment".to_string(),
            ));
        }

        let message = ChatMessage {
            id: utils::timestamp_id("m_"),
            user_id: message.user_id,
            sender: message.sender,
            text: message.text,
            attachment,
            read: false,
            created_at: Utc::now(),
        };

        let key = self.store.next_log_key()?;
        self.store.chat.insert(key, encode(&message)?)?;

        Ok(message)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.chat.clear()?;
        log::warn!("Chat log cleared.");
        Ok(())
    }

    /// Marks every message of one conversation as read and returns how many
    /// changed.
    pub fn mark_read(&self, user_id: Option<&str>) -> Result<usize, StoreError> {
        let mut updated = 0;

        for entry in self.store.chat.iter() {
            let (key, value) = entry?;
            let written = update_value(&self.store.chat, &key, value, |message: &mut ChatMessage| {
                if message.user_id.as_deref() != user_id || message.read {
                    return false;
                }
                message.read = true;
                true
            })?;

            if written {
                updated += 1;
            }
        }

        Ok(updated)
    }

    pub fn conversation_meta(&self, conversation: &str) -> Result<Map<String, Value>, StoreError> {
        match self.store.conversation_meta.get(conversation.as_bytes())? {
            Some(bytes) => decode(conversation.as_bytes(), &bytes),
            None => Ok(Map::new()),
        }
    }

    /// Shallow merge: keys in `meta` overwrite, other keys are kept. Retries
    /// until the merge lands on the value it was computed from.
    pub fn set_conversation_meta(
        &self,
        conversation: &str,
        meta: Map<String, Value>,
    ) -> Result<Map<String, Value>, StoreError> {
        let key = conversation.as_bytes();

        loop {
            let current = self.store.conversation_meta.get(key)?;
            let mut merged: Map<String, Value> = match &current {
                Some(bytes) => decode(key, bytes)?,
                None => Map::new(),
            };
            merged.extend(meta.clone());

            let swapped = self.store.conversation_meta.compare_and_swap(
                key,
                current.as_ref(),
                Some(encode(&merged)?),
            )?;
            if swapped.is_ok() {
                return Ok(merged);
            }
            log::debug!("Concurrent update on conversation {}, retrying", conversation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{Attachment, Sender};
    use crate::repositories::test_support::create_test_store;
    use serde_json::json;

    fn message(user_id: Option<&str>, text: &str) -> NewChatMessage {
        NewChatMessage {
            user_id: user_id.map(str::to_string),
            sender: Sender::User,
            text: text.to_string(),
            attachment: None,
        }
    }

    #[test]
    fn test_send_and_list_in_order() {
        let (store, _temp) = create_test_store();
        let repository = ChatRepository::new(store);

        repository.send(message(Some("O_X1"), "hello")).unwrap();
        repository.send(message(None, "anyone there?")).unwrap();

        let messages = repository.messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "hello");
        assert_eq!(messages[1].user_id, None);
    }

    #[test]
    fn test_incomplete_attachment_is_dropped() {
        let (store, _temp) = create_test_store();
        let repository = ChatRepository::new(store);

        let mut with_attachment = message(Some("O_X1"), "see file");
        with_attachment.attachment = Some(Attachment {
            name: "receipt.png".to_string(),
            data_url: String::new(),
        });

        let sent = repository.send(with_attachment).unwrap();
        assert!(sent.attachment.is_none());
    }

    #[test]
    fn test_empty_text_with_incomplete_attachment_is_rejected() {
        let (store, _temp) = create_test_store();
        let repository = ChatRepository::new(store);

        let mut blank = message(Some("O_X1"), "");
        blank.attachment = Some(Attachment {
            name: "x.png".to_string(),
            data_url: String::new(),
        });

        assert!(matches!(
            repository.send(blank),
            Err(StoreError::ValidationFailed(_))
        ));
        assert!(repository.messages().unwrap().is_empty());
    }

    #[test]
    fn test_mark_read_only_touches_one_conversation() {
        let (store, _temp) = create_test_store();
        let repository = ChatRepository::new(store);

        repository.send(message(Some("O_X1"), "a")).unwrap();
        repository.send(message(None, "b")).unwrap();
        repository.send(message(Some("O_X2"), "c")).unwrap();

        assert_eq!(repository.mark_read(None).unwrap(), 1);

        let messages = repository.messages().unwrap();
        assert!(!messages[0].read);
        assert!(messages[1].read);
        assert!(!messages[2].read);
    }

    #[test]
    fn test_clear_wipes_log() {
        let (store, _temp) = create_test_store();
        let repository = ChatRepository::new(store);

        repository.send(message(Some("O_X1"), "a")).unwrap();
        repository.clear().unwrap();

        assert!(repository.messages().unwrap().is_empty());
    }

    #[test]
    fn test_conversation_meta_merges() {
        let (store, _temp) = create_test_store();
        let repository = ChatRepository::new(store);

        let first = json!({"assignee": "admin", "priority": "low"});
        let second = json!({"priority": "high"});
        repository
            .set_conversation_meta("O_X1", first.as_object().unwrap().clone())
            .unwrap();
        repository
            .set_conversation_meta("O_X1", second.as_object().unwrap().clone())
            .unwrap();

        let meta = repository.conversation_meta("O_X1").unwrap();
        assert_eq!(meta["assignee"], "admin");
        assert_eq!(meta["priority"], "high");
        assert!(repository.conversation_meta("O_X2").unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_meta_writers_do_not_lose_keys() {
        let (store, _temp) = create_test_store();
        let repository = ChatRepository::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repository = repository.clone();
                std::thread::spawn(move || {
                    for j in 0..10 {
                        let mut meta = Map::new();
                        meta.insert(format!("k{}_{}", i, j), Value::Bool(true));
                        repository.set_conversation_meta("c", meta).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(repository.conversation_meta("c").unwrap().len(), 80);
    }
}
