use serde::Deserialize;
use validator::Validate;

use crate::pipeline::{ApiResult, Call, Empty, Field, Input, Kind, Reply, Schema};
use crate::services::{Invoice, InvoiceFilter, InvoiceStatus};

const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize, Validate)]
pub struct ListInvoicesQuery {
    #[serde(default)]
    pub status: Vec<InvoiceStatus>,
    #[validate(range(min = 1, max = 200))]
    pub limit: Option<i64>,
    #[validate(range(min = 0))]
    pub offset: Option<i64>,
}

impl Input for ListInvoicesQuery {
    fn schema() -> Option<Schema> {
        Some(
            Schema::object()
                .field(Field::optional("status", Kind::array_of(Kind::Enum(InvoiceStatus::NAMES))))
                .field(Field::optional("limit", Kind::Integer))
                .field(Field::optional("offset", Kind::Integer))
                .strict(),
        )
    }
}

/// GET /api/invoices - list the organization's invoices
///
/// `?status=sent&status=overdue` filters by any of the given statuses.
pub async fn invoice_list(call: Call<Empty, ListInvoicesQuery>) -> ApiResult<Vec<Invoice>> {
    let caller = call.caller()?;
    let filter = InvoiceFilter {
        statuses: call.query.status.clone(),
        limit: Some(call.query.limit.unwrap_or(DEFAULT_LIMIT) as usize),
        offset: call.query.offset.unwrap_or(0) as usize,
    };

    let invoices = call.state.invoices.list(caller.organization_id, &filter).await?;
    Ok(Reply::ok(invoices))
}
