use std::sync::Arc;

use crate::config::AppConfig;
use crate::pipeline::auth::SessionProvider;
use crate::pipeline::rate_limit::{RateLimitStore, RateLimiter};
use crate::services::{InvoiceService, NotificationService};

/// Everything a call needs beyond the request itself, passed explicitly to
/// the pipeline and on to route callbacks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<dyn SessionProvider>,
    pub rate_limiter: RateLimiter,
    pub invoices: Arc<dyn InvoiceService>,
    pub notifications: Arc<dyn NotificationService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        sessions: Arc<dyn SessionProvider>,
        store: Arc<dyn RateLimitStore>,
        invoices: Arc<dyn InvoiceService>,
        notifications: Arc<dyn NotificationService>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(&config.rate_limits, store);
        Self {
            config: Arc::new(config),
            sessions,
            rate_limiter,
            invoices,
            notifications,
        }
    }
}
