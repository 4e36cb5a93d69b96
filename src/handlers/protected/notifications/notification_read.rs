use serde::Deserialize;
use uuid::Uuid;

use crate::pipeline::{ApiResult, Call, Empty, Reply};
use crate::services::Notification;

#[derive(Debug, Deserialize)]
pub struct NotificationPath {
    pub id: Uuid,
}

/// POST /api/notifications/:id/read - mark one notification read
///
/// Repeating the call on a read notification succeeds and keeps the
/// original `read_at`.
pub async fn notification_read(call: Call<Empty, Empty, NotificationPath>) -> ApiResult<Notification> {
    let caller = call.caller()?;
    let notification = call
        .state
        .notifications
        .mark_read(caller.organization_id, caller.user_id, call.params.id)
        .await?;
    Ok(Reply::ok(notification))
}
