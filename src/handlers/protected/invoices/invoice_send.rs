use serde::Deserialize;
use validator::Validate;

use crate::pipeline::{ApiResult, Call, Empty, Field, Input, Kind, Reply, Schema};
use crate::services::Invoice;

use super::InvoicePath;

#[derive(Debug, Deserialize, Validate)]
pub struct SendInvoice {
    #[validate(email)]
    pub recipient_email: String,
    #[validate(length(max = 2000))]
    pub message: Option<String>,
}

impl Input for SendInvoice {
    fn schema() -> Option<Schema> {
        Some(
            Schema::object()
                .field(Field::required("recipient_email", Kind::String))
                .field(Field::optional("message", Kind::String))
                .strict(),
        )
    }
}

/// POST /api/invoices/:id/send - deliver an invoice to the customer
pub async fn invoice_send(call: Call<SendInvoice, Empty, InvoicePath>) -> ApiResult<Invoice> {
    let caller = call.caller()?;
    let invoice = call
        .state
        .invoices
        .send(
            caller.organization_id,
            call.params.id,
            &call.body.recipient_email,
            call.body.message.as_deref(),
        )
        .await?;

    tracing::info!(invoice = %invoice.id, number = %invoice.number, "Invoice sent");
    Ok(Reply::ok(invoice))
}
