use serde::Serialize;
use uuid::Uuid;

use crate::auth::Role;

/// Authenticated caller for one request: who they are, which organization
/// they act in, and their role there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl RequestContext {
    pub fn new(user_id: Uuid, organization_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            organization_id,
            role,
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}
