use serde::Deserialize;
use validator::Validate;

use crate::pipeline::{ApiResult, Call, Empty, Field, Input, Kind, Reply, Schema};
use crate::services::Invoice;

use crate::handlers::protected::invoices::InvoicePath;

#[derive(Debug, Deserialize, Validate)]
pub struct VoidInvoice {
    #[validate(length(min = 3, max = 500))]
    pub reason: String,
}

impl Input for VoidInvoice {
    fn schema() -> Option<Schema> {
        Some(Schema::object().field(Field::required("reason", Kind::String)).strict())
    }
}

/// POST /api/invoices/:id/void - void an invoice (billing admins only)
///
/// Voiding an already void invoice returns it unchanged.
pub async fn invoice_void(call: Call<VoidInvoice, Empty, InvoicePath>) -> ApiResult<Invoice> {
    let caller = call.caller()?;
    let invoice = call
        .state
        .invoices
        .void(caller.organization_id, call.params.id, &call.body.reason, caller.user_id)
        .await?;

    tracing::info!(invoice = %invoice.id, by = %caller.user_id, "Invoice voided");
    Ok(Reply::ok(invoice))
}
