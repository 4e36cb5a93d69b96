//! The request pipeline every API route passes through.
//!
//! Stages run in a fixed order and each returns `Result<_, ApiError>`:
//!
//! 1. resolve the caller's session (authenticated routes only)
//! 2. check the caller's role against the route's allow-list
//! 3. count the call against the route's rate-limit policy
//! 4. parse path params, body and query into the callback's typed inputs
//! 5. invoke the callback
//!
//! The first failure short-circuits and is normalized once by
//! [`ApiError::into_response`](crate::error::ApiError), so every call ends
//! in exactly one JSON response.

pub mod auth;
pub mod context;
pub mod rate_limit;
pub mod response;
pub mod route;
pub mod router;
pub mod schema;
pub mod validation;

pub use context::RequestContext;
pub use response::{ApiResult, Reply};
pub use route::{Access, RouteConfig, RouteConfigError};
pub use router::Routes;
pub use schema::{Field, Kind, Schema};
pub use validation::{Empty, FieldViolation, Input};

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, Path, Request},
    http::{request::Parts, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::error::ApiError;
use crate::state::AppState;

use self::rate_limit::{CallerKey, RateDecision};

/// Validated inputs handed to a route callback.
pub struct Call<B = Empty, Q = Empty, P = Empty> {
    pub parts: Parts,
    /// Present on every authenticated route; `None` only on public routes.
    pub context: Option<RequestContext>,
    pub body: B,
    pub query: Q,
    pub params: P,
    pub state: AppState,
}

impl<B, Q, P> Call<B, Q, P> {
    /// The authenticated caller.
    pub fn caller(&self) -> Result<&RequestContext, ApiError> {
        self.context
            .as_ref()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Runs one call through the pipeline. Never fails: errors become responses.
pub async fn execute<B, Q, P, R, F, Fut>(state: AppState, config: Arc<RouteConfig>, callback: F, request: Request) -> Response
where
    B: Input,
    Q: Input,
    P: DeserializeOwned + Send + 'static,
    R: Serialize,
    F: FnOnce(Call<B, Q, P>) -> Fut + Send,
    Fut: Future<Output = ApiResult<R>> + Send,
{
    let span = tracing::info_span!("request", route = %config.name);
    let log_requests = state.config.api.enable_request_logging;

    async move {
        let started = Instant::now();
        let response = process(state, &config, callback, request)
            .await
            .unwrap_or_else(reject);

        if log_requests {
            tracing::info!(
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request completed"
            );
        }
        response
    }
    .instrument(span)
    .await
}

async fn process<B, Q, P, R, F, Fut>(
    state: AppState,
    config: &RouteConfig,
    callback: F,
    request: Request,
) -> Result<Response, ApiError>
where
    B: Input,
    Q: Input,
    P: DeserializeOwned + Send + 'static,
    R: Serialize,
    F: FnOnce(Call<B, Q, P>) -> Fut + Send,
    Fut: Future<Output = ApiResult<R>> + Send,
{
    let (parts, body) = request.into_parts();

    // Identity and role
    let context = match config.access {
        Access::Public => None,
        Access::Authenticated => {
            let context = auth::authenticate(
                state.sessions.as_ref(),
                &parts.headers,
                &state.config.security.session_cookie,
            )
            .await?;
            auth::authorize(&context, config.allowed_roles())?;
            Some(context)
        }
    };

    // Quota
    let caller = match &context {
        Some(context) => CallerKey::User(context.user_id),
        None => CallerKey::Ip(client_ip(&parts, state.config.rate_limits.trust_forwarded_headers)),
    };
    let decision = state.rate_limiter.check(config.rate_limit, &caller).await?;

    // Every counted call carries the quota headers, failures included
    let mut response = invoke(state, config, callback, parts, body, context)
        .await
        .unwrap_or_else(reject);
    if let Some(RateDecision::Allowed { limit, remaining }) = decision {
        let headers = response.headers_mut();
        headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limit));
        headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
    }
    Ok(response)
}

/// Parses the inputs and runs the callback.
async fn invoke<B, Q, P, R, F, Fut>(
    state: AppState,
    config: &RouteConfig,
    callback: F,
    mut parts: Parts,
    body: Body,
    context: Option<RequestContext>,
) -> Result<Response, ApiError>
where
    B: Input,
    Q: Input,
    P: DeserializeOwned + Send + 'static,
    R: Serialize,
    F: FnOnce(Call<B, Q, P>) -> Fut + Send,
    Fut: Future<Output = ApiResult<R>> + Send,
{
    let (params, body, query) = parse_inputs::<B, Q, P>(&state, config, &mut parts, body).await?;

    let call = Call {
        parts,
        context,
        body,
        query,
        params,
        state,
    };

    let reply = AssertUnwindSafe(callback(call))
        .catch_unwind()
        .await
        .map_err(|panic| ApiError::internal(format!("route callback panicked: {}", panic_message(&*panic))))??;

    Ok(reply.into_response())
}

fn reject(err: ApiError) -> Response {
    match &err {
        ApiError::Internal(_) => {} // logged with full detail by the normalizer
        ApiError::RateLimited { .. } | ApiError::Forbidden(_) => tracing::warn!("Rejected: {}", err),
        _ => tracing::debug!("Rejected: {}", err),
    }
    err.into_response()
}

/// Parses path params, body and query, reporting every violation together.
async fn parse_inputs<B, Q, P>(
    state: &AppState,
    config: &RouteConfig,
    parts: &mut Parts,
    body: Body,
) -> Result<(P, B, Q), ApiError>
where
    B: Input,
    Q: Input,
    P: DeserializeOwned + Send + 'static,
{
    let mut violations = Vec::new();

    let params = match Path::<P>::from_request_parts(parts, state).await {
        Ok(Path(params)) => Some(params),
        Err(rejection) => {
            violations.push(FieldViolation::new("path", "type", rejection.body_text()));
            None
        }
    };

    let limit = state.config.api.max_request_size_bytes;
    let bytes = axum::body::to_bytes(body, limit).await.map_err(|_| {
        ApiError::validation(vec![FieldViolation::new(
            "body",
            "max_size",
            format!("Request body could not be read or exceeds {} bytes", limit),
        )])
    })?;

    let body = validation::parse_body::<B>(config.body_schema.as_ref(), &bytes)
        .map_err(|errors| violations.extend(errors))
        .ok();
    let query = validation::parse_query::<Q>(config.query_schema.as_ref(), parts.uri.query())
        .map_err(|errors| violations.extend(errors))
        .ok();

    match (params, body, query) {
        (Some(params), Some(body), Some(query)) if violations.is_empty() => Ok((params, body, query)),
        _ => Err(ApiError::validation(violations)),
    }
}

/// Client address for keying anonymous callers.
///
/// Forwarded headers are only read when `trust_forwarded` is set; a direct
/// client could otherwise pick a fresh key per call.
pub fn client_ip(parts: &Parts, trust_forwarded: bool) -> String {
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let forwarded = if trust_forwarded {
        header("x-forwarded-for").or_else(|| header("x-real-ip"))
    } else {
        None
    };

    forwarded
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn peer(mut parts: Parts, octets: [u8; 4]) -> Parts {
        parts.extensions.insert(ConnectInfo(SocketAddr::from((octets, 5000))));
        parts
    }

    #[test]
    fn test_client_ip_trusted_proxy_headers() {
        let forwarded = peer(
            parts(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1"), ("x-real-ip", "10.0.0.2")]),
            [10, 0, 0, 1],
        );
        assert_eq!(client_ip(&forwarded, true), "203.0.113.9");
        assert_eq!(client_ip(&parts(&[("x-real-ip", "10.0.0.2")]), true), "10.0.0.2");
    }

    #[test]
    fn test_client_ip_ignores_headers_unless_trusted() {
        let spoofed = peer(parts(&[("x-forwarded-for", "203.0.113.9"), ("x-real-ip", "10.0.0.2")]), [192, 0, 2, 4]);
        assert_eq!(client_ip(&spoofed, false), "192.0.2.4");

        // No peer recorded and nothing trusted
        assert_eq!(client_ip(&parts(&[("x-forwarded-for", "203.0.113.9")]), false), "unknown");
        assert_eq!(client_ip(&peer(parts(&[]), [192, 0, 2, 4]), true), "192.0.2.4");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*payload), "non-string panic payload");
    }
}
