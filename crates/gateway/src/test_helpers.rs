//! Shared mocks for gateway tests.

use std::sync::Mutex;
use std::time::Duration;
use tutorly_core::cache::CacheStore;
use tutorly_core::error::{CacheError, ProviderError, RetrievalError};
use tutorly_core::message::Message;
use tutorly_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tutorly_core::retriever::{RetrievalRequest, RetrievalResult, RetrievedDocument, Retriever};

/// Answers every call with the same text and counts calls.
pub struct RecordingProvider {
    answer: String,
    calls: Mutex<usize>,
}

impl RecordingProvider {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.into(),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        "recording_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        Ok(ProviderResponse {
            message: Message::assistant(&self.answer),
            usage: None,
            model: "mock-model".into(),
        })
    }
}

/// Fails every call with a network error.
pub struct FailingProvider;

#[async_trait::async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection reset".into()))
    }
}

/// Returns a fixed result and counts calls.
pub struct StaticRetriever {
    result: RetrievalResult,
    calls: Mutex<usize>,
}

impl StaticRetriever {
    pub fn new(documents: Vec<RetrievedDocument>, context: &str) -> Self {
        Self {
            result: RetrievalResult {
                documents,
                context: context.into(),
            },
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        "static_mock"
    }

    async fn retrieve(&self, _request: RetrievalRequest) -> Result<RetrievalResult, RetrievalError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.result.clone())
    }
}

/// Panics on every call.
pub struct PanickingRetriever;

#[async_trait::async_trait]
impl Retriever for PanickingRetriever {
    fn name(&self) -> &str {
        "panicking_mock"
    }

    async fn retrieve(&self, _request: RetrievalRequest) -> Result<RetrievalResult, RetrievalError> {
        panic!("lesson index corrupted")
    }
}

/// A store whose every operation fails.
pub struct FailingCacheStore;

#[async_trait::async_trait]
impl CacheStore for FailingCacheStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn del(&self, _key: &str) -> Result<usize, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

/// Yield until the detached cache write for `key` has landed.
pub async fn wait_for_key(store: &dyn CacheStore, key: &str) {
    for _ in 0..100 {
        if store.exists(key).await.unwrap_or(false) {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("cache key never written: {key}");
}

/// Two biology documents, the first longer than a source preview.
pub fn photosynthesis_docs() -> Vec<RetrievedDocument> {
    let mut metadata = serde_json::Map::new();
    metadata.insert("subject".into(), serde_json::json!("Biology"));
    metadata.insert("grade".into(), serde_json::json!("9th"));
    vec![
        RetrievedDocument {
            id: "bio-photosynthesis-1".into(),
            content: "Photosynthesis is the process by which green plants use sunlight, water \
                      and carbon dioxide to produce glucose and oxygen. It takes place in the \
                      chloroplasts, where chlorophyll captures light energy and drives the light \
                      reactions and the Calvin cycle."
                .into(),
            metadata: metadata.clone(),
        },
        RetrievedDocument {
            id: "bio-photosynthesis-2".into(),
            content: "Chlorophyll absorbs mostly red and blue light.".into(),
            metadata,
        },
    ]
}
