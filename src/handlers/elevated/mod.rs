// handlers/elevated/mod.rs - Endpoints restricted by role
//
// The role check happens in the pipeline from the route's allowed roles;
// callbacks here can assume the caller holds one of them.

mod invoice_void;

pub use invoice_void::{invoice_void, VoidInvoice};
