use serde::Deserialize;
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

use crate::pipeline::{ApiResult, Call, Empty, Field, Input, Kind, Reply, Schema};
use crate::services::{DeliveryMethod, Reminder};

use super::InvoicePath;

/// Reminder request. Fields beyond `email` and `phone` are kept and stored
/// with the reminder.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "require_contact"))]
pub struct RemindInvoice {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn require_contact(input: &RemindInvoice) -> Result<(), ValidationError> {
    if input.email.is_none() && input.phone.is_none() {
        let mut error = ValidationError::new("contact");
        error.message = Some("Either email or phone is required".into());
        return Err(error);
    }
    Ok(())
}

impl Input for RemindInvoice {
    fn schema() -> Option<Schema> {
        Some(
            Schema::object()
                .field(Field::optional("email", Kind::String))
                .field(Field::optional("phone", Kind::String))
                .passthrough(),
        )
    }
}

/// POST /api/invoices/:id/remind - queue a payment reminder
pub async fn invoice_remind(call: Call<RemindInvoice, Empty, InvoicePath>) -> ApiResult<Reminder> {
    let organization_id = call.caller()?.organization_id;
    let RemindInvoice { email, phone, extra } = call.body;

    // TODO: route phone-only reminders to DeliveryMethod::Sms once an SMS sender exists
    let method = DeliveryMethod::Email;
    let destination = email.or(phone).unwrap_or_default();

    let reminder = call
        .state
        .invoices
        .remind(organization_id, call.params.id, method, &destination, extra)
        .await?;

    Ok(Reply::created(reminder))
}
