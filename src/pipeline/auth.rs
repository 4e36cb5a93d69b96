use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use dashmap::DashMap;

use crate::auth::{validate_jwt, Role};
use crate::error::ApiError;

use super::context::RequestContext;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The credential was presented but does not identify a live session.
    #[error("{0}")]
    Invalid(String),
    /// The identity backend could not answer.
    #[error("session backend unavailable: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Resolves a session credential into the caller's identity.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn resolve(&self, credential: &str) -> Result<RequestContext, SessionError>;
}

/// Verifies HS256 session tokens issued by the identity backend.
pub struct JwtSessionProvider {
    secret: String,
}

impl JwtSessionProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }
}

#[async_trait]
impl SessionProvider for JwtSessionProvider {
    async fn resolve(&self, credential: &str) -> Result<RequestContext, SessionError> {
        let claims = validate_jwt(credential, &self.secret).map_err(|e| SessionError::Invalid(e.to_string()))?;

        let role: Role = claims
            .role
            .parse()
            .map_err(|e| SessionError::Invalid(format!("Session carries {}", e)))?;

        Ok(RequestContext {
            user_id: claims.sub,
            organization_id: claims.org,
            role,
            email: claims.email,
        })
    }
}

/// Opaque-token sessions held in memory. Used for local development and tests.
#[derive(Default)]
pub struct MemorySessionProvider {
    sessions: DashMap<String, RequestContext>,
}

impl MemorySessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, context: RequestContext) {
        self.sessions.insert(token.into(), context);
    }

    pub fn revoke(&self, token: &str) {
        self.sessions.remove(token);
    }
}

#[async_trait]
impl SessionProvider for MemorySessionProvider {
    async fn resolve(&self, credential: &str) -> Result<RequestContext, SessionError> {
        self.sessions
            .get(credential)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SessionError::Invalid("Session not found or expired".to_string()))
    }
}

/// Extracts the session credential: `Authorization: Bearer` first, then the session cookie.
pub fn extract_credential(headers: &HeaderMap, cookie_name: &str) -> Result<String, String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| "Invalid Authorization header format".to_string())?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| "Authorization header must use Bearer token format".to_string())?;

        if token.trim().is_empty() {
            return Err("Empty session token".to_string());
        }
        return Ok(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
        .ok_or_else(|| "Missing session credential".to_string())
}

/// Resolves the caller for an authenticated route.
pub async fn authenticate(
    provider: &dyn SessionProvider,
    headers: &HeaderMap,
    cookie_name: &str,
) -> Result<RequestContext, ApiError> {
    let credential = extract_credential(headers, cookie_name).map_err(ApiError::unauthorized)?;

    match provider.resolve(&credential).await {
        Ok(context) => Ok(context),
        Err(SessionError::Invalid(msg)) => {
            tracing::debug!("Session rejected: {}", msg);
            Err(ApiError::unauthorized("Invalid or expired session"))
        }
        Err(SessionError::Backend(err)) => Err(ApiError::Internal(err.context("session lookup failed"))),
    }
}

/// Checks the caller's role against a route's allow-list; `None` admits every role.
pub fn authorize(context: &RequestContext, allowed_roles: Option<&[Role]>) -> Result<(), ApiError> {
    match allowed_roles {
        Some(roles) if !context.has_role(roles) => {
            tracing::warn!(
                "Role '{}' of user {} is not permitted on this route",
                context.role,
                context.user_id
            );
            Err(ApiError::forbidden(format!(
                "Role '{}' is not permitted to perform this action",
                context.role
            )))
        }
        _ => Ok(()),
    }
}
