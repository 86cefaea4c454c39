//! Per-user notification fan-out.
//!
//! `publish` writes the durable record first, then broadcasts to every live
//! session in the owner's group. Delivery is fire-and-forget: an owner with
//! no connected session still gets the row, and a full or closed channel
//! never fails the publishing request.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult, models::Notification};

const GROUP_CAPACITY: usize = 64;

#[derive(Clone, Default)]
pub struct NotificationBus {
    groups: Arc<RwLock<HashMap<Uuid, broadcast::Sender<Notification>>>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live session for `owner_id`. Every session joined to the
    /// same owner receives every broadcast to that owner.
    pub async fn join(&self, owner_id: Uuid) -> broadcast::Receiver<Notification> {
        let mut groups = self.groups.write().await;
        groups
            .entry(owner_id)
            .or_insert_with(|| broadcast::channel(GROUP_CAPACITY).0)
            .subscribe()
    }

    /// Drop the owner's group once its last session has disconnected.
    pub async fn leave(&self, owner_id: Uuid) {
        let mut groups = self.groups.write().await;
        if let Some(sender) = groups.get(&owner_id) {
            if sender.receiver_count() == 0 {
                groups.remove(&owner_id);
            }
        }
    }

    /// Persist the notification, then broadcast it live. Returns the stored
    /// record regardless of how many sessions received it.
    pub async fn publish(
        &self,
        pool: &DbPool,
        owner_id: Uuid,
        message: &str,
    ) -> AppResult<Notification> {
        let notification: Notification = sqlx::query_as(
            r#"
            INSERT INTO notifications (id, user_id, message)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(message)
        .fetch_one(pool)
        .await?;

        let delivered = self.broadcast_live(owner_id, notification.clone()).await;
        tracing::debug!(user_id = %owner_id, delivered, "notification published");

        Ok(notification)
    }

    /// Best-effort live delivery; returns how many sessions received it.
    pub async fn broadcast_live(&self, owner_id: Uuid, notification: Notification) -> usize {
        let groups = self.groups.read().await;
        match groups.get(&owner_id) {
            Some(sender) => sender.send(notification).unwrap_or(0),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn notification(owner_id: Uuid, message: &str) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: owner_id,
            message: message.to_string(),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_session_of_the_owner() {
        let bus = NotificationBus::new();
        let owner = Uuid::new_v4();
        let mut first = bus.join(owner).await;
        let mut second = bus.join(owner).await;

        let delivered = bus
            .broadcast_live(owner, notification(owner, "order paid"))
            .await;
        assert_eq!(delivered, 2);
        assert_eq!(first.recv().await.unwrap().message, "order paid");
        assert_eq!(second.recv().await.unwrap().message, "order paid");
    }

    #[tokio::test]
    async fn broadcast_does_not_leak_across_owners() {
        let bus = NotificationBus::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut session = bus.join(other).await;

        let delivered = bus.broadcast_live(owner, notification(owner, "hi")).await;
        assert_eq!(delivered, 0);
        assert!(session.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_without_sessions_is_a_no_op() {
        let bus = NotificationBus::new();
        let owner = Uuid::new_v4();
        let delivered = bus.broadcast_live(owner, notification(owner, "hi")).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn leave_prunes_an_empty_group() {
        let bus = NotificationBus::new();
        let owner = Uuid::new_v4();
        let receiver = bus.join(owner).await;
        drop(receiver);
        bus.leave(owner).await;
        assert!(bus.groups.read().await.get(&owner).is_none());
    }
}
