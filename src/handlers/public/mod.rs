// handlers/public/mod.rs - Endpoints callable without a session
//
// Quote requests still pass through the pipeline under the `public`
// rate-limit policy. Liveness sits outside the pipeline entirely.

mod health;
mod quote_request;

pub use health::{health, root};
pub use quote_request::{quote_request, OrganizationPath, QuoteReceipt, QuoteRequest};
