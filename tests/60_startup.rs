mod common;

use std::sync::Arc;

use axum::http::StatusCode;

use fieldops_api::auth::Role;
use fieldops_api::config::{AppConfig, ConfigError, PolicySpec};
use fieldops_api::pipeline::auth::MemorySessionProvider;
use fieldops_api::pipeline::rate_limit::MemoryRateLimitStore;
use fieldops_api::pipeline::{Call, Reply, RouteConfig, Routes};
use fieldops_api::services::{MemoryInvoiceService, MemoryNotificationService};
use fieldops_api::AppState;

use common::test_config;

fn state(config: AppConfig) -> AppState {
    AppState::new(
        config,
        Arc::new(MemorySessionProvider::new()),
        Arc::new(MemoryRateLimitStore::new()),
        Arc::new(MemoryInvoiceService::new()),
        Arc::new(MemoryNotificationService::new()),
    )
}

#[test]
fn test_unknown_policy_fails_at_startup() {
    let mut config = test_config();
    config.rate_limits.policies.remove("heavy");

    let err = fieldops_api::app(state(config)).unwrap_err();
    assert_eq!(err.problems.len(), 1);
    assert!(err.problems[0].starts_with("GET /api/reports/invoice-aging"));
    assert!(err.problems[0].contains("'heavy'"));
}

#[test]
fn test_every_bad_route_is_reported() {
    async fn noop(_call: Call) -> fieldops_api::pipeline::ApiResult<()> {
        Ok(Reply::no_content())
    }

    let err = Routes::new(state(test_config()))
        .get("/a", RouteConfig::new("nonexistent"), noop)
        .get("/b", RouteConfig::new("general").roles(&[]), noop)
        .get("/c", RouteConfig::public("public").roles(&[Role::Admin]), noop)
        .get("/d", RouteConfig::new("general").roles(&[Role::Admin, Role::Admin]), noop)
        .build()
        .unwrap_err();

    let routes: Vec<_> = err.problems.iter().map(|p| p.split(':').next().unwrap()).collect();
    assert_eq!(routes, vec!["GET /a", "GET /b", "GET /c", "GET /d"]);
}

#[tokio::test]
async fn test_custom_route_runs_through_pipeline() {
    async fn echo(call: Call) -> fieldops_api::pipeline::ApiResult<String> {
        Ok(Reply::ok(call.caller()?.role.to_string()))
    }

    let sessions = Arc::new(MemorySessionProvider::new());
    let state = AppState::new(
        test_config(),
        sessions.clone(),
        Arc::new(MemoryRateLimitStore::new()),
        Arc::new(MemoryInvoiceService::new()),
        Arc::new(MemoryNotificationService::new()),
    );
    sessions.insert(
        "t",
        fieldops_api::pipeline::RequestContext::new(uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), Role::Manager),
    );

    let router = Routes::new(state)
        .get("/echo", RouteConfig::new("general").roles(&[Role::Manager]), echo)
        .build()
        .unwrap();

    let app = common::TestApp {
        router,
        ..common::TestApp::new()
    };
    let response = app.get("/echo", Some("t")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "manager");
}

#[tokio::test]
async fn test_panicking_callback_becomes_internal_error() {
    async fn explode(_call: Call) -> fieldops_api::pipeline::ApiResult<()> {
        panic!("ledger row 17 is corrupt");
    }

    let router = Routes::new(state(test_config()))
        .get("/explode", RouteConfig::public("public"), explode)
        .build()
        .unwrap();
    let app = common::TestApp {
        router,
        ..common::TestApp::new()
    };

    let response = app.get("/explode", None).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["code"], "INTERNAL");
    assert!(!response.body["error"].as_str().unwrap().contains("ledger"));

    // The router keeps answering
    assert_eq!(app.get("/explode", None).await.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = test_config();
    config.api.max_request_size_bytes = 64;
    let app = common::TestApp::with_config(config);
    let (token, _) = app.login(Role::Manager);
    let invoice = app.invoices.create_draft(app.org, "Acme Soil", rust_decimal::Decimal::ONE);

    let response = app
        .post(
            &format!("/api/invoices/{}/send", invoice.id),
            Some(&token),
            Some(serde_json::json!({"recipient_email": "ap@example.com", "message": "x".repeat(500)})),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.violation_fields(), vec!["body"]);
    assert_eq!(response.body["details"]["violations"][0]["constraint"], "max_size");
}

#[test]
fn test_production_requires_jwt_secret() {
    let config = AppConfig::production();
    assert!(matches!(config.validate(), Err(ConfigError::MissingJwtSecret(_))));

    let mut config = AppConfig::production();
    config.security.jwt_secret = "a-real-secret".into();
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_policy_is_rejected() {
    let mut config = test_config();
    config.rate_limits.policies.insert("burst".into(), PolicySpec::new(0, 60));
    assert!(matches!(config.validate(), Err(ConfigError::EmptyPolicy(name)) if name == "burst"));
}
