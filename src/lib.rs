//! Macro is a place-sharing API for posts, likes and follows, plus the screen
//! view-models that drive it from a client.

#![forbid(unsafe_code)]
mod apple;
pub mod client;
pub mod config;
mod database;
mod dto;
pub mod error;
mod middleware;
pub mod model;
mod post;
mod router;
pub mod telemetry;
mod token;
mod user;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::{Router, middleware as AxumMiddleware};
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH: &str = "CONFIG_PATH";

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    state: Option<&AppState>,
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(state) = state {
        let token = state
            .token
            .create("jinha@macro.test")
            .expect("cannot create JWT");
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub db: database::Database,
    pub token: token::TokenManager,
    pub apple: Arc<dyn apple::IdentityVerifier>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    let mut routes = Vec::new();
    let mut api = Router::new();
    for (route, handler) in router::table() {
        api = api.route(route.path, handler);
        routes.push(route);
    }

    let routes = router::Routes::new(routes);
    for route in routes.iter().filter(|route| route.access == router::Access::Public) {
        tracing::debug!(method = %route.method, path = route.path, "public route");
    }

    let gate = middleware::Gate {
        token: state.token.clone(),
        routes: Arc::new(routes),
    };

    api.route_layer(AxumMiddleware::from_fn_with_state(gate, middleware::gate))
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .with_state(state)
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>> {
    let mut config = config::Configuration::default();
    if let Ok(path) = std::env::var(CONFIG_PATH) {
        config = config.path(PathBuf::from(path));
    }
    let config = config.read()?;

    let db = match &config.seed {
        Some(path) => database::Database::new().seed(path)?,
        None => database::Database::new(),
    };

    let Some(token_config) = &config.token else {
        return Err("missing `token` entry in configuration".into());
    };
    let mut token = token::TokenManager::new(
        &config.url,
        token_config.key_id.clone(),
        &token_config.public_key_pem,
        &token_config.private_key_pem,
    )?;
    if let Some(audience) = &token_config.audience {
        token.audience(audience);
    }

    let apple = match &config.apple {
        Some(apple) => apple::AppleKeyVerifier::new(apple)?,
        None => {
            tracing::warn!("missing `apple` entry, every identity token will be rejected");
            apple::AppleKeyVerifier::new(&config::Apple::default())?
        },
    };

    Ok(AppState {
        config,
        db,
        token,
        apple: Arc::new(apple),
    })
}
