use std::collections::HashSet;

use crate::auth::Role;

use super::rate_limit::RateLimiter;
use super::schema::Schema;
use super::validation::Input;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No session required; rate limited by client address.
    Public,
    Authenticated,
}

/// Per-route policy, fixed when the route is defined and shared by every call.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub name: String,
    pub access: Access,
    pub rate_limit: &'static str,
    pub allowed_roles: Option<Vec<Role>>,
    pub body_schema: Option<Schema>,
    pub query_schema: Option<Schema>,
}

impl RouteConfig {
    /// An authenticated route under the given rate-limit policy.
    pub fn new(rate_limit: &'static str) -> Self {
        Self {
            name: String::new(),
            access: Access::Authenticated,
            rate_limit,
            allowed_roles: None,
            body_schema: None,
            query_schema: None,
        }
    }

    pub fn public(rate_limit: &'static str) -> Self {
        Self {
            access: Access::Public,
            ..Self::new(rate_limit)
        }
    }

    pub fn roles(mut self, roles: &[Role]) -> Self {
        self.allowed_roles = Some(roles.to_vec());
        self
    }

    /// Attaches the schemas of the callback's typed inputs.
    pub(crate) fn bind<B: Input, Q: Input>(mut self, name: String) -> Self {
        self.name = name;
        self.body_schema = B::schema();
        self.query_schema = Q::schema();
        self
    }

    pub fn allowed_roles(&self) -> Option<&[Role]> {
        self.allowed_roles.as_deref()
    }

    /// Problems with this route's definition; empty when it is sound.
    pub fn problems(&self, limiter: &RateLimiter) -> Vec<String> {
        let mut problems = Vec::new();

        if !limiter.has_policy(self.rate_limit) {
            problems.push(format!("unknown rate limit policy '{}'", self.rate_limit));
        }

        if let Some(roles) = &self.allowed_roles {
            if self.access == Access::Public {
                problems.push("public route declares allowed roles".to_string());
            }
            if roles.is_empty() {
                problems.push("allowed roles is empty, nobody could call it".to_string());
            }
            let unique: HashSet<_> = roles.iter().collect();
            if unique.len() != roles.len() {
                problems.push("allowed roles contains duplicates".to_string());
            }
        }

        if let Some(schema) = &self.body_schema {
            problems.extend(schema.definition_errors().into_iter().map(|e| format!("body schema: {}", e)));
        }
        if let Some(schema) = &self.query_schema {
            problems.extend(schema.definition_errors().into_iter().map(|e| format!("query schema: {}", e)));
        }

        problems
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid route configuration:\n{}", .problems.join("\n"))]
pub struct RouteConfigError {
    pub problems: Vec<String>,
}
