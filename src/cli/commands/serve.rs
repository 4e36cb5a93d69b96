use anyhow::Context;
use clap::Args;
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::app::app;
use crate::config::AppConfig;
use crate::pipeline::auth::JwtSessionProvider;
use crate::pipeline::rate_limit::MemoryRateLimitStore;
use crate::services::{
    InvoiceService, MemoryInvoiceService, MemoryNotificationService, NewNotification, NotificationService,
};
use crate::state::AppState;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    #[arg(long, help = "Bind host (overrides HOST)")]
    pub host: Option<String>,

    #[arg(long, help = "Bind port (overrides FIELDOPS_API_PORT / PORT)")]
    pub port: Option<u16>,

    #[arg(long, help = "Seed demo invoices and a notification for this organization")]
    pub seed_org: Option<Uuid>,
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    tracing::info!("Starting FieldOps API in {:?} mode", config.environment);
    if !config.rate_limits.enabled {
        tracing::warn!("Rate limiting is disabled");
    }

    let invoices = Arc::new(MemoryInvoiceService::new());
    let notifications = Arc::new(MemoryNotificationService::new());
    if let Some(org) = args.seed_org {
        seed(&invoices, &*notifications, org).await?;
    }

    let sessions = Arc::new(JwtSessionProvider::new(config.security.jwt_secret.clone()));
    let state = AppState::new(
        config,
        sessions,
        Arc::new(MemoryRateLimitStore::new()),
        invoices,
        notifications,
    );

    if state.config.rate_limits.enabled {
        state
            .rate_limiter
            .spawn_purger(Duration::from_secs(state.config.rate_limits.purge_interval_secs));
    }

    let bind_addr = state.config.bind_addr();
    let router = app(state)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("FieldOps API listening on http://{}", bind_addr);

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn seed(
    invoices: &MemoryInvoiceService,
    notifications: &dyn NotificationService,
    organization_id: Uuid,
) -> anyhow::Result<()> {
    let customers = [
        ("Acme Soil Testing", Decimal::new(125_000, 2)),
        ("Northside HVAC", Decimal::new(48_250, 2)),
        ("Greenway Landscaping", Decimal::new(310_000, 2)),
    ];
    for (i, (customer, total)) in customers.iter().enumerate() {
        let invoice = invoices.create_draft(organization_id, customer, *total);
        if i > 0 {
            invoices
                .send(organization_id, invoice.id, "billing@example.com", None)
                .await?;
        }
    }

    notifications
        .create(
            organization_id,
            NewNotification {
                user_id: None,
                kind: "system.welcome".into(),
                title: "Welcome to FieldOps".into(),
                body: "Demo data has been loaded for this organization.".into(),
            },
        )
        .await?;

    tracing::info!(organization = %organization_id, "Seeded demo data");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
