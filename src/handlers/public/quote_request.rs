use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::pipeline::{ApiResult, Call, Empty, Field, Input, Kind, Reply, Schema};
use crate::services::NewNotification;

#[derive(Debug, Deserialize)]
pub struct OrganizationPath {
    pub organization_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuoteRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub service: String,
    #[validate(length(max = 4000))]
    pub details: Option<String>,
}

impl Input for QuoteRequest {
    fn schema() -> Option<Schema> {
        Some(
            Schema::object()
                .field(Field::required("name", Kind::String))
                .field(Field::required("email", Kind::String))
                .field(Field::optional("phone", Kind::String))
                .field(Field::required("service", Kind::String))
                .field(Field::optional("details", Kind::String))
                .strict(),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct QuoteReceipt {
    pub reference: Uuid,
    pub status: &'static str,
}

/// POST /api/public/:organization_id/quote-requests - submit a quote request
///
/// Anonymous. The request lands in the organization's notification feed.
pub async fn quote_request(call: Call<QuoteRequest, Empty, OrganizationPath>) -> ApiResult<QuoteReceipt> {
    let QuoteRequest {
        name,
        email,
        phone,
        service,
        details,
    } = call.body;

    let mut body = format!("{} <{}>", name, email);
    if let Some(phone) = phone {
        body.push_str(&format!(", {}", phone));
    }
    if let Some(details) = details {
        body.push_str("\n\n");
        body.push_str(&details);
    }

    let notification = call
        .state
        .notifications
        .create(
            call.params.organization_id,
            NewNotification {
                user_id: None,
                kind: "quote.requested".into(),
                title: format!("Quote requested: {}", service),
                body,
            },
        )
        .await?;

    Ok(Reply::created(QuoteReceipt {
        reference: notification.id,
        status: "received",
    }))
}
