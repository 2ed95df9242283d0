//! Query API.
//!
//! - `POST /api/query`: answer a question, `200 {answer, sources}`
//!
//! Errors are `{error}` bodies: 400 for an invalid request, 405 for any
//! other method on the query path.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri},
    middleware,
    response::Json,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use tutorly_agent::QueryResponse;
use tutorly_core::query::QueryRequest;

use crate::SharedState;
use crate::cache_layer::key::{fold_headers, normalize_headers};
use crate::cache_layer::{CachePolicy, KeyGenerator, KeyRequest, cache_key, cache_middleware};

pub const QUERY_PATH: &str = "/api/query";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

/// Cache policy for the query route: POSTs keyed on the validated query,
/// subject and grade.
pub fn query_cache_policy(config: &tutorly_config::CacheConfig) -> CachePolicy {
    CachePolicy::new(Duration::from_secs(config.ttl_secs))
        .with_should_cache(is_query_post)
        .with_key_generator(QueryKeyGenerator::new(&config.vary_headers))
}

/// Keys a query body only once it passes validation.
///
/// An invalid body yields no key, so it bypasses the cache and gets its 400
/// from the handler regardless of what is stored.
#[derive(Debug, Clone)]
pub struct QueryKeyGenerator {
    vary_headers: Vec<String>,
}

impl QueryKeyGenerator {
    pub fn new<I, S>(vary_headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            vary_headers: normalize_headers(vary_headers),
        }
    }
}

impl KeyGenerator for QueryKeyGenerator {
    fn generate(&self, request: &KeyRequest<'_>) -> Option<String> {
        let body: serde_json::Value = serde_json::from_slice(request.body?).ok()?;
        let query = QueryRequest::from_json(&body).ok()?;

        let mut params = vec![("query".to_string(), query.query)];
        if let Some(subject) = query.subject {
            params.push(("subject".to_string(), subject));
        }
        if let Some(grade) = query.grade {
            params.push(("grade".to_string(), grade));
        }

        let mut key = cache_key(request.method, request.path, &params);
        fold_headers(&mut key, request.headers, &self.vary_headers);
        Some(key)
    }

    fn needs_body(&self) -> bool {
        true
    }
}

fn is_query_post(method: &Method, uri: &Uri) -> bool {
    *method == Method::POST && uri.path() == QUERY_PATH
}

/// The query route with the response cache in front of it.
pub fn query_router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route(
            QUERY_PATH,
            post(query_handler).fallback(method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(
            state.cache.clone(),
            cache_middleware,
        ))
}

async fn query_handler(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<QueryResponse>, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "Rejecting non-JSON query body");
        bad_request("request body must be valid JSON")
    })?;

    let request = QueryRequest::from_json(&value).map_err(|errors| {
        debug!(errors = %errors, "Rejecting invalid query");
        bad_request(errors.to_string())
    })?;

    info!(
        query_chars = request.query.chars().count(),
        format = ?request.response_format,
        "Query received"
    );

    Ok(Json(state.pipeline.answer(&request).await))
}

async fn method_not_allowed(method: Method) -> ApiError {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorResponse::new(format!(
            "method {method} not allowed, use POST"
        ))),
    )
}
