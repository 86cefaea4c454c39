use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Notification;

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationList {
    pub items: Vec<Notification>,
}

/// Frame sent over the live channel for each published notification.
#[derive(Debug, Serialize)]
pub struct NotificationEvent<'a> {
    pub event: &'static str,
    pub notification: &'a Notification,
}
