use serde::Deserialize;
use validator::Validate;

use crate::pipeline::{ApiResult, Call, Empty, Field, Input, Kind, Reply, Schema};
use crate::services::Notification;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
}

impl Input for ListNotificationsQuery {
    fn schema() -> Option<Schema> {
        Some(Schema::object().field(Field::optional("unread_only", Kind::Boolean)))
    }
}

/// GET /api/notifications - newest first
pub async fn notification_list(call: Call<Empty, ListNotificationsQuery>) -> ApiResult<Vec<Notification>> {
    let caller = call.caller()?;
    let notifications = call
        .state
        .notifications
        .list(caller.organization_id, caller.user_id, call.query.unread_only)
        .await?;
    Ok(Reply::ok(notifications))
}
