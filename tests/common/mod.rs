#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use fieldops_api::auth::Role;
use fieldops_api::config::{AppConfig, PolicySpec};
use fieldops_api::pipeline::auth::{MemorySessionProvider, SessionProvider};
use fieldops_api::pipeline::rate_limit::MemoryRateLimitStore;
use fieldops_api::pipeline::RequestContext;
use fieldops_api::services::{MemoryInvoiceService, MemoryNotificationService};
use fieldops_api::AppState;

/// Heavy quota used by the test profile, small enough to exhaust quickly.
pub const HEAVY_QUOTA: u32 = 3;
pub const PUBLIC_QUOTA: u32 = 5;

/// Development profile with rate limiting switched on and tight quotas.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.api.enable_request_logging = false;
    config.rate_limits.enabled = true;
    config.rate_limits.policies = BTreeMap::from([
        ("general".to_string(), PolicySpec::new(1000, 60)),
        ("heavy".to_string(), PolicySpec::new(HEAVY_QUOTA, 60)),
        ("auth".to_string(), PolicySpec::new(10, 60)),
        ("public".to_string(), PolicySpec::new(PUBLIC_QUOTA, 60)),
    ]);
    config
}

/// The application wired to in-memory collaborators, driven in-process.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub sessions: Arc<MemorySessionProvider>,
    pub invoices: Arc<MemoryInvoiceService>,
    pub notifications: Arc<MemoryNotificationService>,
    pub org: Uuid,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Field names of a validation failure, in reported order.
    pub fn violation_fields(&self) -> Vec<String> {
        self.body["details"]["violations"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|v| v["field"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::build(config, None).expect("test router should build")
    }

    /// Builds with a custom session provider in place of the in-memory one.
    pub fn with_sessions(config: AppConfig, sessions: Arc<dyn SessionProvider>) -> Self {
        Self::build(config, Some(sessions)).expect("test router should build")
    }

    fn build(config: AppConfig, provider: Option<Arc<dyn SessionProvider>>) -> Result<Self> {
        let sessions = Arc::new(MemorySessionProvider::new());
        let invoices = Arc::new(MemoryInvoiceService::new());
        let notifications = Arc::new(MemoryNotificationService::new());

        let state = AppState::new(
            config,
            provider.unwrap_or_else(|| sessions.clone() as Arc<dyn SessionProvider>),
            Arc::new(MemoryRateLimitStore::new()),
            invoices.clone(),
            notifications.clone(),
        );
        let router = fieldops_api::app(state.clone())?;

        Ok(Self {
            router,
            state,
            sessions,
            invoices,
            notifications,
            org: Uuid::new_v4(),
        })
    }

    /// Opens a session for a new user of the test organization.
    pub fn login(&self, role: Role) -> (String, RequestContext) {
        let context = RequestContext::new(Uuid::new_v4(), self.org, role);
        let token = format!("session-{}", Uuid::new_v4());
        self.sessions.insert(token.clone(), context.clone());
        (token, context)
    }

    pub async fn call(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };

        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.call(request(Method::GET, uri, token, None)).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        self.call(request(Method::POST, uri, token, body)).await
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid request")
}

/// The application served on a real socket.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn(router: Router) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind port {}", port))?;

        let handle = tokio::spawn(async move {
            let service = router.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                eprintln!("test server stopped: {}", e);
            }
        });

        let server = Self { port, base_url, handle };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        let url = format!("{}/health", self.base_url);
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
