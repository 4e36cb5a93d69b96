// handlers/protected/reports - Aggregate reports
//
// Reports scan the whole organization and run under the `heavy` rate-limit
// policy.

mod invoice_aging;

pub use invoice_aging::{invoice_aging, AgingBucket, AgingQuery, AgingReport};
