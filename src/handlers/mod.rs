// handlers/mod.rs - Route callbacks grouped by access tier
//
// Public (anonymous, keyed by client address) → Protected (any session)
// → Elevated (session with a billing-admin role)

pub mod elevated;
pub mod protected;
pub mod public;
