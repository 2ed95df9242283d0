//! Shared test helpers for pattern tests.

use std::sync::Mutex;
use tutorly_core::error::{ProviderError, RetrievalError};
use tutorly_core::message::Message;
use tutorly_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use tutorly_core::retriever::{RetrievalRequest, RetrievalResult, RetrievedDocument, Retriever};

/// A mock provider that answers every call with the same text and records
/// the requests it saw.
pub struct RecordingProvider {
    answer: String,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl RecordingProvider {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> ProviderRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        "recording_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        Ok(make_text_response(&self.answer))
    }
}

/// A provider whose every call fails with a 503.
pub struct FailingProvider;

#[async_trait::async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::ApiError {
            status_code: 503,
            message: "service unavailable".into(),
        })
    }
}

/// A retriever that returns a fixed result and counts calls.
pub struct StaticRetriever {
    result: Option<RetrievalResult>,
    requests: Mutex<Vec<RetrievalRequest>>,
}

impl StaticRetriever {
    pub fn new(documents: Vec<RetrievedDocument>, context: &str) -> Self {
        Self {
            result: Some(RetrievalResult {
                documents,
                context: context.into(),
            }),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A retriever whose every call fails.
    pub fn failing() -> Self {
        Self {
            result: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> RetrievalRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        "static_mock"
    }

    async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResult, RetrievalError> {
        self.requests.lock().unwrap().push(request);
        self.result
            .clone()
            .ok_or_else(|| RetrievalError::Network("connection refused".into()))
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A document with subject metadata.
pub fn make_document(id: &str, content: &str, subject: &str) -> RetrievedDocument {
    let mut metadata = serde_json::Map::new();
    metadata.insert("subject".into(), serde_json::json!(subject));
    RetrievedDocument {
        id: id.into(),
        content: content.into(),
        metadata,
    }
}
