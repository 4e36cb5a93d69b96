// handlers/protected/invoices - Invoice endpoints for any authenticated role
//
// Every lookup is scoped to the caller's organization; an invoice owned by
// another organization reads as not found.

mod invoice_get;
mod invoice_list;
mod invoice_remind;
mod invoice_send;

pub use invoice_get::invoice_get;
pub use invoice_list::{invoice_list, ListInvoicesQuery};
pub use invoice_remind::{invoice_remind, RemindInvoice};
pub use invoice_send::{invoice_send, SendInvoice};

use serde::Deserialize;
use uuid::Uuid;

/// `:id` segment shared by the per-invoice routes.
#[derive(Debug, Deserialize)]
pub struct InvoicePath {
    pub id: Uuid,
}
