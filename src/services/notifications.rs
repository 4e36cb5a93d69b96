use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use super::ServiceError;

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// `None` addresses everyone in the organization.
    pub user_id: Option<Uuid>,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    fn visible_to(&self, organization_id: Uuid, user_id: Uuid) -> bool {
        self.organization_id == organization_id && self.user_id.map_or(true, |u| u == user_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Option<Uuid>,
    pub kind: String,
    pub title: String,
    pub body: String,
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn list(&self, organization_id: Uuid, user_id: Uuid, unread_only: bool)
        -> Result<Vec<Notification>, ServiceError>;

    /// Marking an already read notification succeeds and keeps the first read time.
    async fn mark_read(&self, organization_id: Uuid, user_id: Uuid, id: Uuid) -> Result<Notification, ServiceError>;

    /// Returns how many notifications changed state.
    async fn mark_all_read(&self, organization_id: Uuid, user_id: Uuid) -> Result<usize, ServiceError>;

    async fn create(&self, organization_id: Uuid, notification: NewNotification) -> Result<Notification, ServiceError>;
}

#[derive(Default)]
pub struct MemoryNotificationService {
    notifications: DashMap<Uuid, Notification>,
}

impl MemoryNotificationService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationService for MemoryNotificationService {
    async fn list(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>, ServiceError> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|n| n.visible_to(organization_id, user_id))
            .filter(|n| !unread_only || n.read_at.is_none())
            .map(|n| n.value().clone())
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn mark_read(&self, organization_id: Uuid, user_id: Uuid, id: Uuid) -> Result<Notification, ServiceError> {
        let mut entry = self
            .notifications
            .get_mut(&id)
            .filter(|n| n.visible_to(organization_id, user_id))
            .ok_or_else(|| ServiceError::NotFound(format!("Notification {} not found", id)))?;

        let notification = entry.value_mut();
        if notification.read_at.is_none() {
            notification.read_at = Some(Utc::now());
        }
        Ok(notification.clone())
    }

    async fn mark_all_read(&self, organization_id: Uuid, user_id: Uuid) -> Result<usize, ServiceError> {
        let now = Utc::now();
        let mut changed = 0;
        for mut entry in self.notifications.iter_mut() {
            let notification = entry.value_mut();
            if notification.visible_to(organization_id, user_id) && notification.read_at.is_none() {
                notification.read_at = Some(now);
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn create(&self, organization_id: Uuid, notification: NewNotification) -> Result<Notification, ServiceError> {
        let created = Notification {
            id: Uuid::new_v4(),
            organization_id,
            user_id: notification.user_id,
            kind: notification.kind,
            title: notification.title,
            body: notification.body,
            read_at: None,
            created_at: Utc::now(),
        };
        self.notifications.insert(created.id, created.clone());
        Ok(created)
    }
}
