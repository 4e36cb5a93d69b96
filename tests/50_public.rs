mod common;

use std::net::{IpAddr, SocketAddr};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};

use fieldops_api::auth::Role;
use fieldops_api::services::NotificationService;

use common::{test_config, TestApp, PUBLIC_QUOTA};

/// A quote request arriving from `peer`, as recorded by the server socket.
fn quote_request(app: &TestApp, peer: &str, body: Value) -> Request<Body> {
    quote_request_via(app, peer, None, body)
}

/// As [`quote_request`], with an `x-forwarded-for` header set by the client.
fn quote_request_via(app: &TestApp, peer: &str, forwarded_for: Option<&str>, body: Value) -> Request<Body> {
    let ip: IpAddr = peer.parse().unwrap();
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/public/{}/quote-requests", app.org))
        .header(header::CONTENT_TYPE, "application/json")
        .extension(ConnectInfo(SocketAddr::new(ip, 40000)));
    if let Some(forwarded_for) = forwarded_for {
        builder = builder.header("x-forwarded-for", forwarded_for);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn valid() -> Value {
    json!({
        "name": "Dana Whitfield",
        "email": "dana@example.com",
        "service": "Backflow test",
        "details": "Two devices, commercial kitchen",
    })
}

#[tokio::test]
async fn test_quote_request_needs_no_session() -> anyhow::Result<()> {
    let app = TestApp::new();

    let response = app.call(quote_request(&app, "203.0.113.7", valid())).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["status"], "received");

    // It lands in the organization's feed
    let (_, context) = app.login(Role::Admin);
    let feed = app.notifications.list(app.org, context.user_id, true).await?;
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].kind, "quote.requested");
    assert_eq!(feed[0].id.to_string(), response.body["reference"].as_str().unwrap());
    Ok(())
}

#[tokio::test]
async fn test_quote_request_is_validated() {
    let app = TestApp::new();

    let response = app
        .call(quote_request(&app, "203.0.113.7", json!({"email": "nope", "admin": true})))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let mut fields = response.violation_fields();
    fields.sort();
    assert_eq!(fields, vec!["admin", "name", "service"]);
}

#[tokio::test]
async fn test_public_route_is_limited_by_client_address() {
    let app = TestApp::new();

    for _ in 0..PUBLIC_QUOTA {
        let response = app.call(quote_request(&app, "198.51.100.1", valid())).await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let response = app.call(quote_request(&app, "198.51.100.1", valid())).await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(response.header("retry-after").is_some());

    // A different address has its own window
    let response = app.call(quote_request(&app, "198.51.100.2", valid())).await;
    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_rotating_forwarded_header_does_not_reset_quota() {
    let app = TestApp::new();

    for i in 0..PUBLIC_QUOTA {
        let spoofed = format!("10.9.9.{}", i);
        let response = app
            .call(quote_request_via(&app, "192.0.2.50", Some(&spoofed), valid()))
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    for i in 0..10 {
        let spoofed = format!("10.9.8.{}", i);
        let response = app
            .call(quote_request_via(&app, "192.0.2.50", Some(&spoofed), valid()))
            .await;
        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    }
}

#[tokio::test]
async fn test_trusted_proxy_keys_by_forwarded_client() {
    let mut config = test_config();
    config.rate_limits.trust_forwarded_headers = true;
    let app = TestApp::with_config(config);

    // Every call arrives from the proxy's address
    for _ in 0..PUBLIC_QUOTA {
        let response = app
            .call(quote_request_via(&app, "10.0.0.1", Some("198.51.100.1"), valid()))
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let response = app
        .call(quote_request_via(&app, "10.0.0.1", Some("198.51.100.1"), valid()))
        .await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);

    let response = app
        .call(quote_request_via(&app, "10.0.0.1", Some("198.51.100.2, 10.0.0.1"), valid()))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_unknown_route_has_error_envelope() {
    let app = TestApp::new();

    let response = app.get("/api/nope", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["code"], "NOT_FOUND");
    assert!(response.body["error"].is_string());
}

#[tokio::test]
async fn test_wrong_method_has_error_envelope() {
    let app = TestApp::new();
    let (token, _) = app.login(Role::Admin);

    let response = app.post("/api/me", Some(&token), None).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.body["code"], "NOT_FOUND");
    assert!(response.body["error"].is_string());
    assert!(response.header("allow").unwrap_or_default().contains("GET"));

    let void = format!("/api/invoices/{}/void", uuid::Uuid::new_v4());
    let response = app.get(&void, Some(&token)).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_health_is_outside_the_pipeline() {
    let app = TestApp::new();
    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.header("x-ratelimit-limit"), None);
}
