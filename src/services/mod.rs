// Domain services reached by route callbacks once the pipeline has admitted a call.
//
// Each service is a trait so the backend can be swapped; the in-memory
// implementations back local development and tests.

pub mod invoices;
pub mod notifications;

pub use invoices::{DeliveryMethod, Invoice, InvoiceFilter, InvoiceService, InvoiceStatus, MemoryInvoiceService, Reminder};
pub use notifications::{MemoryNotificationService, NewNotification, Notification, NotificationService};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("service backend unavailable")]
    Unavailable(#[source] anyhow::Error),
}
