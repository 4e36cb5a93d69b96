use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// GET / - service banner
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "FieldOps API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health (public)",
            "public": "/api/public/:organization_id/* (public, rate limited by address)",
            "me": "/api/me (protected)",
            "invoices": "/api/invoices[/:id[/send|/remind|/void]] (protected, void requires a billing admin)",
            "reports": "/api/reports/* (protected, heavy quota)",
            "notifications": "/api/notifications[/:id/read|/read-all] (protected)",
        }
    }))
}

/// GET /health - liveness, outside the request pipeline
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "timestamp": chrono::Utc::now(),
        })),
    )
}
