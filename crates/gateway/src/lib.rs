//! HTTP gateway for tutorly.
//!
//! Exposes the query endpoint (behind the response cache) and a health
//! check. Built on Axum; the pipeline, cache store and generator are built
//! once at startup and shared through [`AppState`].

pub mod api;
pub mod cache_layer;

#[cfg(test)]
pub(crate) mod test_helpers;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use tutorly_agent::{KeywordRetriever, RagPipeline};
use tutorly_config::AppConfig;
use tutorly_core::cache::CacheStore;
use tutorly_core::error::{Error, ProviderError};
use tutorly_core::retriever::Retriever;
use tutorly_providers::HttpRetriever;

use crate::api::ErrorResponse;
use crate::cache_layer::ResponseCache;

/// Shared application state for the gateway.
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    pub cache: Arc<ResponseCache>,
    pub production: bool,
    pub max_body_bytes: usize,
    pub cors_origins: Vec<String>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        pipeline: Arc<RagPipeline>,
        store: Arc<dyn CacheStore>,
        config: &AppConfig,
    ) -> SharedState {
        let cache = ResponseCache::new(store, api::query_cache_policy(&config.cache))
            .with_max_body_bytes(config.gateway.max_body_bytes);

        Arc::new(Self {
            pipeline,
            cache: Arc::new(cache),
            production: config.is_production(),
            max_body_bytes: config.gateway.max_body_bytes,
            cors_origins: config.gateway.cors_origins.clone(),
        })
    }
}

/// Build the retriever selected by `retriever.backend`.
pub fn build_retriever(config: &AppConfig) -> Result<Arc<dyn Retriever>, Error> {
    match config.retriever.backend.as_str() {
        "http" => Ok(Arc::new(HttpRetriever::from_config(&config.retriever)?)),
        _ => {
            let retriever = KeywordRetriever::from_config(config);
            if retriever.is_empty() {
                warn!("Keyword retriever has no documents; answers will be ungrounded");
            }
            Ok(Arc::new(retriever))
        }
    }
}

/// Build the RAG pipeline: default generator plus configured retriever.
pub fn build_pipeline(config: &AppConfig) -> Result<RagPipeline, Error> {
    let providers = tutorly_providers::router::build_from_config(config);
    let generator = providers.default().ok_or_else(|| {
        Error::Provider(ProviderError::NotConfigured(format!(
            "no provider named \"{}\"",
            config.default_provider
        )))
    })?;
    let retriever = build_retriever(config)?;

    Ok(RagPipeline::from_config(config, retriever, generator))
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let production = state.production;

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .merge(api::query_router(state.clone()))
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(CatchPanicLayer::custom(
            move |panic: Box<dyn Any + Send + 'static>| panic_response(panic, production),
        ));

    if let Some(cors) = cors_layer(&state.cors_origins) {
        router = router.layer(cors);
    }

    router
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600)),
    )
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let pipeline = Arc::new(build_pipeline(&config)?);
    let store = tutorly_cache::build_from_config(&config);

    info!(
        addr = %addr,
        cache = store.name(),
        provider = pipeline.generator_name(),
        model = pipeline.model(),
        retriever = %config.retriever.backend,
        "Gateway starting"
    );

    let app = build_router(AppState::new(pipeline, store, &config));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    cache: String,
    provider: String,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cache: state.cache.store().name().to_string(),
        provider: state.pipeline.generator_name().to_string(),
    })
}

/// 500 for a panicking handler. The panic text is only exposed outside
/// production.
fn panic_response(panic: Box<dyn Any + Send + 'static>, production: bool) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".into());

    error!(detail = %detail, "Handler panicked");

    let message = if production {
        "internal server error".to_string()
    } else {
        format!("internal server error: {detail}")
    };

    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::new(message))).into_response()
}
