use crate::config::ProxyConfig;
use crate::error::Result;
use crate::forward;
use crate::interceptor::{intercept, Interceptor};
use crate::logging::SharedLogger;

use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub client: reqwest::Client,
    pub logger: SharedLogger,
    pub interceptor: Arc<Interceptor>,
}

impl AppState {
    /// Fails when `config` does not validate.
    pub fn new(config: ProxyConfig, client: reqwest::Client, logger: SharedLogger) -> Result<Self> {
        let interceptor = Arc::new(Interceptor::new(&config, logger.clone())?);
        Ok(Self {
            config,
            client,
            logger,
            interceptor,
        })
    }
}

/// Production router: the interceptor in front of the `reqwest` forwarder.
pub fn build_router(state: Arc<AppState>) -> Router {
    let interceptor = state.interceptor.clone();
    let downstream = Router::new()
        .fallback(forward::forward_upstream)
        .with_state(state);

    with_interceptor(downstream, interceptor)
}

/// Put `/health`, the interceptor, CORS and request tracing in front of any
/// downstream router. CORS sits outside the interceptor so preflights are
/// answered without reaching it.
pub fn with_interceptor(downstream: Router, interceptor: Arc<Interceptor>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .merge(downstream)
        .layer(middleware::from_fn_with_state(interceptor, intercept))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
