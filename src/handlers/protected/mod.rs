// handlers/protected/mod.rs - Endpoints for any authenticated role

pub mod invoices;
pub mod me;
pub mod notifications;
pub mod reports;

pub use me::whoami;
