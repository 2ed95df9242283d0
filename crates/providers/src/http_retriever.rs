//! Remote document retriever over HTTP.
//!
//! POSTs `{query, filter, topK, maxContextTokens}` as JSON to a configured
//! endpoint and expects `{documents: [...], context: "..."}` back.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use tutorly_core::error::RetrievalError;
use tutorly_core::retriever::{RetrievalRequest, RetrievalResult, Retriever};

pub struct HttpRetriever {
    url: String,
    client: reqwest::Client,
}

impl HttpRetriever {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            url: url.into(),
            client,
        }
    }

    /// Build from the `[retriever]` config section.
    pub fn from_config(config: &tutorly_config::RetrieverConfig) -> Result<Self, RetrievalError> {
        let url = config.url.as_deref().ok_or_else(|| {
            RetrievalError::NotConfigured("retriever.url is required for the http backend".into())
        })?;
        Ok(Self::new(url, Duration::from_secs(config.timeout_secs)))
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    fn name(&self) -> &str {
        "http"
    }

    async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResult, RetrievalError> {
        debug!(url = %self.url, top_k = request.top_k, "Sending retrieval request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RetrievalError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::ApiError {
                status_code: status.as_u16(),
                message: body,
            });
        }

        let mut result: RetrievalResult = response
            .json()
            .await
            .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?;

        result.documents.truncate(request.top_k);
        Ok(result)
    }
}
