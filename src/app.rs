use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::BILLING_ADMINS;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::handlers::{elevated, protected, public};
use crate::pipeline::{RouteConfig, RouteConfigError, Routes};
use crate::state::AppState;

/// Builds the full application router.
///
/// Fails when any route refers to an unknown rate-limit policy or carries
/// an unusable role list or schema.
pub fn app(state: AppState) -> Result<Router, RouteConfigError> {
    let cors = cors_layer(&state.config);

    let api = pipeline_routes(Routes::new(state)).build()?;

    let mut router = Router::new()
        // Outside the pipeline
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(api)
        .fallback(route_not_found)
        .layer(middleware::map_response(method_not_allowed))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors {
        router = router.layer(cors);
    }
    Ok(router)
}

fn pipeline_routes(routes: Routes) -> Routes {
    let routes = public_routes(routes);
    let routes = protected_routes(routes);
    elevated_routes(routes)
}

fn public_routes(routes: Routes) -> Routes {
    routes.post(
        "/api/public/:organization_id/quote-requests",
        RouteConfig::public("public"),
        public::quote_request,
    )
}

fn protected_routes(routes: Routes) -> Routes {
    use protected::{invoices, notifications, reports};

    routes
        .get("/api/me", RouteConfig::new("general"), protected::whoami)
        // Invoices
        .get("/api/invoices", RouteConfig::new("general"), invoices::invoice_list)
        .get("/api/invoices/:id", RouteConfig::new("general"), invoices::invoice_get)
        .post("/api/invoices/:id/send", RouteConfig::new("general"), invoices::invoice_send)
        .post("/api/invoices/:id/remind", RouteConfig::new("general"), invoices::invoice_remind)
        // Reports
        .get("/api/reports/invoice-aging", RouteConfig::new("heavy"), reports::invoice_aging)
        // Notifications
        .get("/api/notifications", RouteConfig::new("general"), notifications::notification_list)
        .post("/api/notifications/read-all", RouteConfig::new("general"), notifications::notification_read_all)
        .post("/api/notifications/:id/read", RouteConfig::new("general"), notifications::notification_read)
}

fn elevated_routes(routes: Routes) -> Routes {
    routes.post(
        "/api/invoices/:id/void",
        RouteConfig::new("general").roles(BILLING_ADMINS),
        elevated::invoice_void,
    )
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

/// Gives axum's bare 405 the error envelope, keeping its `Allow` header.
async fn method_not_allowed(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let mut normalized = ApiError::not_found("Method not allowed on this route").into_response();
    *normalized.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
    if let Some(allow) = response.headers().get(header::ALLOW) {
        normalized.headers_mut().insert(header::ALLOW, allow.clone());
    }
    normalized
}

fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    if !config.security.enable_cors {
        return None;
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .expose_headers([
                header::RETRY_AFTER,
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderName::from_static("x-ratelimit-remaining"),
            ])
            .allow_credentials(true),
    )
}
