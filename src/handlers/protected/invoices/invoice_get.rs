use crate::pipeline::{ApiResult, Call, Empty, Reply};
use crate::services::Invoice;

use super::InvoicePath;

/// GET /api/invoices/:id - show a single invoice
pub async fn invoice_get(call: Call<Empty, Empty, InvoicePath>) -> ApiResult<Invoice> {
    let caller = call.caller()?;
    let invoice = call.state.invoices.get(caller.organization_id, call.params.id).await?;
    Ok(Reply::ok(invoice))
}
