use serde::Serialize;

use crate::pipeline::{ApiResult, Call, Reply};

#[derive(Debug, Serialize)]
pub struct ReadAllResult {
    pub updated: usize,
}

/// POST /api/notifications/read-all - mark every visible notification read
pub async fn notification_read_all(call: Call) -> ApiResult<ReadAllResult> {
    let caller = call.caller()?;
    let updated = call
        .state
        .notifications
        .mark_all_read(caller.organization_id, caller.user_id)
        .await?;

    tracing::debug!(updated, "Notifications marked read");
    Ok(Reply::ok(ReadAllResult { updated }))
}
