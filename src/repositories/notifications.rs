use chrono::Utc;

use super::{decode, encode, read_log, update_value, Store, StoreError};
use crate::models::chat::Notification;
use crate::utils;

/// Simulated e-mail: notifications are only recorded, never delivered.
#[derive(Clone)]
pub struct NotificationRepository {
    store: Store,
}

impl NotificationRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn send(&self, user_id: &str, subject: &str, body: &str) -> Result<Notification, StoreError> {
        let notification = Notification {
            id: utils::timestamp_id("n_"),
            user_id: user_id.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            read: false,
            created_at: Utc::now(),
        };

        let key = self.store.next_log_key()?;
        self.store.notifications.insert(key, encode(&notification)?)?;
        log::info!("Notification {} queued for {}: {}", notification.id, user_id, subject);

        Ok(notification)
    }

    pub fn for_user(&self, user_id: &str) -> Result<Vec<Notification>, StoreError> {
        let all: Vec<Notification> = read_log(&self.store.notifications)?;
        Ok(all.into_iter().filter(|n| n.user_id == user_id).collect())
    }

    /// Returns false when no notification has this id.
    pub fn mark_read(&self, notification_id: &str) -> Result<bool, StoreError> {
        for entry in self.store.notifications.iter() {
            let (key, value) = entry?;
            let notification: Notification = decode(&key, &value)?;

            if notification.id == notification_id {
                update_value(&self.store.notifications, &key, value, |n: &mut Notification| {
                    if n.read {
                        return false;
                    }
                    n.read = true;
                    true
                })?;
                return Ok(true);
            }
        }

        Ok(false)
    }
}
