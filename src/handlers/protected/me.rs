use crate::pipeline::{ApiResult, Call, Reply, RequestContext};

/// GET /api/me - the caller's resolved session
pub async fn whoami(call: Call) -> ApiResult<RequestContext> {
    Ok(Reply::ok(call.caller()?.clone()))
}
