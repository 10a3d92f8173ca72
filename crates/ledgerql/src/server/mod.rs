mod error;
mod limits;
mod query;

use std::sync::Arc;

use axum::routing::{any, get, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use ledgerql_core::rpc::RpcClient;
use ledgerql_core::{Context, ContextConfig, ExpandLimits, ResolutionCache};

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub rpc: RpcClient,
    pub context_config: ContextConfig,
    /// Set with `--shared-cache`; otherwise every request gets a fresh cache.
    pub shared_cache: Option<Arc<ResolutionCache>>,
    pub expand_limits: ExpandLimits,
    pub enable_block_queries: bool,
}

impl AppState {
    /// The resolution context for one request.
    pub fn context(&self) -> Context {
        match &self.shared_cache {
            Some(cache) => Context::with_shared_cache(
                self.rpc.clone(),
                Arc::clone(cache),
                self.context_config,
            ),
            None => Context::new(self.rpc.clone(), self.context_config),
        }
    }
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState, origin: &str) -> eyre::Result<Router> {
    // Only reflect the allowed origin when the request's Origin header
    // actually matches.
    let allowed: axum::http::HeaderValue = origin
        .parse()
        .map_err(|e| eyre::eyre!("invalid origin `{origin}`: {e}"))?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |request_origin: &axum::http::HeaderValue, _| *request_origin == allowed,
        ))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let shared = Arc::new(state);

    let api = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/limits", get(limits::get_limits))
        .route("/api/v1/account/{address}", get(query::get_account))
        .route("/api/v1/query", post(query::post_query));

    Ok(Router::new()
        .merge(api)
        .route("/api", any(api_not_found))
        .route("/api/{*path}", any(api_not_found))
        .layer(cors)
        .with_state(shared))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_not_found() -> error::AppError {
    error::AppError::NotFound("API route not found".to_string())
}
