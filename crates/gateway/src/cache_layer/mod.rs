//! Response caching middleware.
//!
//! Wraps any handler that produces JSON. For requests the policy selects,
//! a stored payload is served directly (`x-cache: HIT`) without running the
//! handler. On a miss the handler runs and a 2xx JSON body is written back
//! in a detached task, so the client never waits on the store.
//!
//! Store failures are logged and otherwise ignored: the request proceeds as
//! if no cache were installed.

pub mod key;

pub use key::{KeyGenerator, KeyRequest, StandardKeyGenerator, cache_key};

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tutorly_core::cache::CacheStore;

use crate::api::ErrorResponse;

pub const CACHE_STATUS_HEADER: &str = "x-cache";

type ShouldCache = Arc<dyn Fn(&Method, &Uri) -> bool + Send + Sync>;

/// What to cache, for how long, and under which key.
#[derive(Clone)]
pub struct CachePolicy {
    pub ttl: Duration,
    should_cache: ShouldCache,
    key_generator: Arc<dyn KeyGenerator>,
}

impl CachePolicy {
    /// Caches GET requests keyed on method, path and query string.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            should_cache: Arc::new(get_only),
            key_generator: Arc::new(StandardKeyGenerator::new()),
        }
    }

    pub fn with_should_cache(
        mut self,
        should_cache: impl Fn(&Method, &Uri) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_cache = Arc::new(should_cache);
        self
    }

    pub fn with_key_generator(mut self, key_generator: impl KeyGenerator + 'static) -> Self {
        self.key_generator = Arc::new(key_generator);
        self
    }
}

fn get_only(method: &Method, _uri: &Uri) -> bool {
    *method == Method::GET
}

/// Shared state for [`cache_middleware`].
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    policy: CachePolicy,
    max_body_bytes: usize,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, policy: CachePolicy) -> Self {
        Self {
            store,
            policy,
            max_body_bytes: 1024 * 1024,
        }
    }

    /// Largest request body buffered for key generation.
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }
}

/// Axum middleware; install with `middleware::from_fn_with_state`.
pub async fn cache_middleware(
    State(cache): State<Arc<ResponseCache>>,
    req: Request,
    next: Next,
) -> Response {
    if !(cache.policy.should_cache)(req.method(), req.uri()) {
        return next.run(req).await;
    }

    if !cache.policy.key_generator.needs_body() {
        return keyed_run(&cache, req, None, next).await;
    }

    let (parts, body) = req.into_parts();
    let body_bytes = match axum::body::to_bytes(body, cache.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "Request body could not be buffered for caching");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(ErrorResponse::new("request body too large")),
            )
                .into_response();
        }
    };

    let req = Request::from_parts(parts, Body::from(body_bytes.clone()));
    keyed_run(&cache, req, Some(body_bytes), next).await
}

async fn keyed_run(
    cache: &Arc<ResponseCache>,
    req: Request,
    body: Option<Bytes>,
    next: Next,
) -> Response {
    let key = KeyRequest::new(req.method(), req.uri(), req.headers(), body.as_deref())
        .and_then(|key_request| cache.policy.key_generator.generate(&key_request));

    let Some(key) = key else {
        debug!(path = %req.uri().path(), "Request not keyable, bypassing cache");
        return next.run(req).await;
    };

    match cache.store.get(&key).await {
        Ok(Some(stored)) => match serde_json::from_str::<serde_json::Value>(&stored) {
            Ok(payload) => {
                debug!(key = %key, "Cache hit");
                return hit_response(payload);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached payload is not valid JSON, treating as miss");
            }
        },
        Ok(None) => debug!(key = %key, "Cache miss"),
        Err(e) => {
            warn!(key = %key, store = cache.store.name(), error = %e, "Cache read failed, bypassing cache");
            return next.run(req).await;
        }
    }

    let response = next.run(req).await;
    if !response.status().is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to read handler response body");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal server error")),
            )
                .into_response();
        }
    };

    if serde_json::from_slice::<serde_json::Value>(&bytes).is_ok() {
        if let Ok(payload) = String::from_utf8(bytes.to_vec()) {
            let store = cache.store.clone();
            let ttl = cache.policy.ttl;
            tokio::spawn(async move {
                match store.set(&key, payload, Some(ttl)).await {
                    Ok(()) => debug!(key = %key, ttl_secs = ttl.as_secs(), "Response cached"),
                    Err(e) => warn!(key = %key, error = %e, "Cache write failed"),
                }
            });
        }
    } else {
        debug!(key = %key, "Response body is not JSON, not caching");
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn hit_response(payload: serde_json::Value) -> Response {
    let mut response = (StatusCode::OK, Json(payload)).into_response();
    response
        .headers_mut()
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("HIT"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingCacheStore, wait_for_key};
    use axum::Router;
    use axum::http::Request as HttpRequest;
    use axum::middleware;
    use axum::routing::{get, post};
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;
    use tutorly_cache::InMemoryCacheStore;

    fn counting_app(cache: Arc<ResponseCache>, calls: Arc<AtomicUsize>) -> Router {
        let get_calls = calls.clone();
        let post_calls = calls.clone();
        let fail_calls = calls;
        Router::new()
            .route(
                "/lessons",
                get(move || {
                    let calls = get_calls.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        Json(serde_json::json!({"lessons": ["cells", "energy"], "call": n}))
                    }
                }),
            )
            .route(
                "/echo",
                post(move |body: String| {
                    let calls = post_calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Json(serde_json::json!({"echo": body}))
                    }
                }),
            )
            .route(
                "/broken",
                get(move || {
                    let calls = fail_calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        (StatusCode::BAD_GATEWAY, Json(ErrorResponse::new("upstream down")))
                    }
                }),
            )
            .layer(middleware::from_fn_with_state(cache, cache_middleware))
    }

    async fn send(app: &Router, req: HttpRequest<Body>) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let cache_header = response
            .headers()
            .get(CACHE_STATUS_HEADER)
            .map(|v| v.to_str().unwrap().to_string());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, cache_header, serde_json::from_slice(&body).unwrap())
    }

    fn get_req(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn get_is_served_from_cache_on_repeat() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = Arc::new(ResponseCache::new(store.clone(), CachePolicy::new(Duration::from_secs(60))));
        let calls = Arc::new(AtomicUsize::new(0));
        let app = counting_app(cache, calls.clone());

        let (status, header, first) = send(&app, get_req("/lessons?grade=9&subject=bio")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(header.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        wait_for_key(store.as_ref(), "cache:GET:/lessons?grade=9&subject=bio").await;

        let (status, header, second) = send(&app, get_req("/lessons?subject=bio&grade=9")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header.as_deref(), Some("HIT"));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_runs_handler_again() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = Arc::new(ResponseCache::new(store.clone(), CachePolicy::new(Duration::from_secs(5))));
        let calls = Arc::new(AtomicUsize::new(0));
        let app = counting_app(cache, calls.clone());

        send(&app, get_req("/lessons")).await;
        wait_for_key(store.as_ref(), "cache:GET:/lessons").await;

        tokio::time::advance(Duration::from_secs(6)).await;

        let (_, header, body) = send(&app, get_req("/lessons")).await;
        assert!(header.is_none());
        assert_eq!(body["call"], 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unselected_requests_always_reach_handler() {
        let store = Arc::new(InMemoryCacheStore::new());
        let policy = CachePolicy::new(Duration::from_secs(60)).with_should_cache(|_, _| false);
        let cache = Arc::new(ResponseCache::new(store.clone(), policy));
        let calls = Arc::new(AtomicUsize::new(0));
        let app = counting_app(cache, calls.clone());

        for _ in 0..3 {
            let (_, header, _) = send(&app, get_req("/lessons")).await;
            assert!(header.is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        tokio::task::yield_now().await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn default_policy_skips_post() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = Arc::new(ResponseCache::new(store.clone(), CachePolicy::new(Duration::from_secs(60))));
        let calls = Arc::new(AtomicUsize::new(0));
        let app = counting_app(cache, calls.clone());

        for _ in 0..2 {
            let req = HttpRequest::builder()
                .method("POST")
                .uri("/echo")
                .body(Body::from("hi"))
                .unwrap();
            send(&app, req).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_success_is_not_cached() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = Arc::new(ResponseCache::new(store.clone(), CachePolicy::new(Duration::from_secs(60))));
        let calls = Arc::new(AtomicUsize::new(0));
        let app = counting_app(cache, calls.clone());

        for _ in 0..2 {
            let (status, _, body) = send(&app, get_req("/broken")).await;
            assert_eq!(status, StatusCode::BAD_GATEWAY);
            assert_eq!(body["error"], "upstream down");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!store.exists("cache:GET:/broken").await.unwrap());
    }

    #[tokio::test]
    async fn store_failure_degrades_to_pass_through() {
        let cache = Arc::new(ResponseCache::new(
            Arc::new(FailingCacheStore),
            CachePolicy::new(Duration::from_secs(60)),
        ));
        let calls = Arc::new(AtomicUsize::new(0));
        let app = counting_app(cache, calls.clone());

        for n in 1..=2 {
            let (status, header, body) = send(&app, get_req("/lessons")).await;
            assert_eq!(status, StatusCode::OK);
            assert!(header.is_none());
            assert_eq!(body["call"], n);
        }
    }

    #[tokio::test]
    async fn body_keyed_post_is_cached_and_body_reaches_handler() {
        let store = Arc::new(InMemoryCacheStore::new());
        let policy = CachePolicy::new(Duration::from_secs(60))
            .with_should_cache(|method, uri| method == Method::POST && uri.path() == "/echo")
            .with_key_generator(StandardKeyGenerator::extended(["accept-language"]));
        let cache = Arc::new(ResponseCache::new(store.clone(), policy));
        let calls = Arc::new(AtomicUsize::new(0));
        let app = counting_app(cache, calls.clone());

        let post = |body: &'static str| {
            HttpRequest::builder()
                .method("POST")
                .uri("/echo")
                .body(Body::from(body))
                .unwrap()
        };

        let (_, _, first) = send(&app, post("mitosis")).await;
        assert_eq!(first["echo"], "mitosis");
        // Wait until the detached write lands.
        for _ in 0..100 {
            if !store.is_empty().await {
                break;
            }
            tokio::task::yield_now().await;
        }

        let (_, header, again) = send(&app, post("mitosis")).await;
        assert_eq!(header.as_deref(), Some("HIT"));
        assert_eq!(again, first);

        let (_, header, other) = send(&app, post("meiosis")).await;
        assert!(header.is_none());
        assert_eq!(other["echo"], "meiosis");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let store = Arc::new(InMemoryCacheStore::new());
        let policy = CachePolicy::new(Duration::from_secs(60))
            .with_should_cache(|_, _| true)
            .with_key_generator(StandardKeyGenerator::extended(Vec::<String>::new()));
        let cache = Arc::new(ResponseCache::new(store, policy).with_max_body_bytes(8));
        let calls = Arc::new(AtomicUsize::new(0));
        let app = counting_app(cache, calls.clone());

        let req = HttpRequest::builder()
            .method("POST")
            .uri("/echo")
            .body(Body::from("a body longer than eight bytes"))
            .unwrap();
        let (status, _, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["error"].is_string());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn corrupt_entry_is_treated_as_miss() {
        let store = Arc::new(InMemoryCacheStore::new());
        store
            .set("cache:GET:/lessons", "not json".into(), None)
            .await
            .unwrap();
        let cache = Arc::new(ResponseCache::new(store.clone(), CachePolicy::new(Duration::from_secs(60))));
        let calls = Arc::new(AtomicUsize::new(0));
        let app = counting_app(cache, calls.clone());

        let (_, header, body) = send(&app, get_req("/lessons")).await;
        assert!(header.is_none());
        assert_eq!(body["call"], 1);
    }
}
