//! Retriever trait: the document source for grounded answers.
//!
//! The retriever owns its documents. The pipeline only reads what comes back
//! and builds display copies; it never mutates a [`RetrievedDocument`].

use crate::error::RetrievalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A document returned by the retriever, most relevant first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Optional metadata filter. A dimension is only constrained when set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
}

impl MetadataFilter {
    /// Build a filter from optional dimensions; `None` when both are absent.
    pub fn from_parts(subject: Option<&str>, grade: Option<&str>) -> Option<Self> {
        if subject.is_none() && grade.is_none() {
            return None;
        }
        Some(Self {
            subject: subject.map(String::from),
            grade: grade.map(String::from),
        })
    }

    /// Whether a document's metadata satisfies every set dimension.
    ///
    /// String comparison is case-insensitive.
    pub fn matches(&self, metadata: &serde_json::Map<String, serde_json::Value>) -> bool {
        let dimension_ok = |key: &str, wanted: &Option<String>| match wanted {
            None => true,
            Some(wanted) => metadata
                .get(key)
                .and_then(|v| v.as_str())
                .is_some_and(|v| v.eq_ignore_ascii_case(wanted)),
        };
        dimension_ok("subject", &self.subject) && dimension_ok("grade", &self.grade)
    }
}

/// A retrieval call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<MetadataFilter>,
    pub top_k: usize,
    pub max_context_tokens: usize,
}

/// Ordered documents plus the merged context string built from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    #[serde(default)]
    pub documents: Vec<RetrievedDocument>,
    #[serde(default)]
    pub context: String,
}

/// The core Retriever trait.
///
/// Implementations: remote HTTP retriever, in-process keyword retriever,
/// scripted mocks in tests.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// The backend name (e.g., "http", "keyword").
    fn name(&self) -> &str;

    /// Retrieve the top documents for a query.
    async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResult, RetrievalError>;
}
