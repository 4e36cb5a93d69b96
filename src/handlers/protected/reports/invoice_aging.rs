use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::pipeline::{ApiResult, Call, Empty, Field, Input, Kind, Reply, Schema};
use crate::services::{Invoice, InvoiceFilter, InvoiceStatus};

#[derive(Debug, Deserialize, Validate)]
pub struct AgingQuery {
    /// Defaults to today (UTC).
    pub as_of: Option<NaiveDate>,
}

impl Input for AgingQuery {
    fn schema() -> Option<Schema> {
        Some(Schema::object().field(Field::optional("as_of", Kind::Date)).strict())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgingBucket {
    pub label: &'static str,
    pub count: usize,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct AgingReport {
    pub as_of: NaiveDate,
    pub outstanding_count: usize,
    pub outstanding_total: Decimal,
    pub buckets: Vec<AgingBucket>,
}

/// Upper bound (days past due, inclusive) of each bucket; the last is open-ended.
const BUCKETS: [(&str, Option<i64>); 5] = [
    ("current", Some(0)),
    ("1-30", Some(30)),
    ("31-60", Some(60)),
    ("61-90", Some(90)),
    ("90+", None),
];

/// Groups outstanding (sent or overdue) invoices by days past due.
pub fn age_invoices(invoices: &[Invoice], as_of: NaiveDate) -> AgingReport {
    let mut buckets: Vec<AgingBucket> = BUCKETS
        .iter()
        .map(|&(label, _)| AgingBucket {
            label,
            count: 0,
            total: Decimal::ZERO,
        })
        .collect();

    let outstanding = invoices
        .iter()
        .filter(|i| matches!(i.status, InvoiceStatus::Sent | InvoiceStatus::Overdue));

    for invoice in outstanding {
        let days_past_due = (as_of - invoice.due_on).num_days();
        let index = BUCKETS
            .iter()
            .position(|(_, max)| max.map_or(true, |max| days_past_due <= max))
            .unwrap_or(BUCKETS.len() - 1);
        buckets[index].count += 1;
        buckets[index].total += invoice.total;
    }

    AgingReport {
        as_of,
        outstanding_count: buckets.iter().map(|b| b.count).sum(),
        outstanding_total: buckets.iter().map(|b| b.total).sum(),
        buckets,
    }
}

/// GET /api/reports/invoice-aging - outstanding balances by age
pub async fn invoice_aging(call: Call<Empty, AgingQuery>) -> ApiResult<AgingReport> {
    let caller = call.caller()?;
    let as_of = call.query.as_of.unwrap_or_else(|| Utc::now().date_naive());

    let invoices = call
        .state
        .invoices
        .list(caller.organization_id, &InvoiceFilter::default())
        .await?;

    Ok(Reply::ok(age_invoices(&invoices, as_of)))
}
