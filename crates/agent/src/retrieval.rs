//! In-process keyword retriever over a configured corpus.
//!
//! Scores each document by how many distinct query terms it contains,
//! applies the metadata filter, keeps the best `top_k`, and merges their
//! contents into a context string capped at `max_context_tokens`.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;
use tutorly_core::error::RetrievalError;
use tutorly_core::retriever::{RetrievalRequest, RetrievalResult, RetrievedDocument, Retriever};

use crate::context::token::estimate_tokens;
use crate::context::truncate::truncate_to_tokens;

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Terms shorter than this are ignored when scoring.
const MIN_TERM_CHARS: usize = 3;

pub struct KeywordRetriever {
    documents: Vec<RetrievedDocument>,
    model: String,
}

impl KeywordRetriever {
    /// `model` selects the token ratio used to cap the merged context.
    pub fn new(documents: Vec<RetrievedDocument>, model: impl Into<String>) -> Self {
        Self {
            documents,
            model: model.into(),
        }
    }

    pub fn from_config(config: &tutorly_config::AppConfig) -> Self {
        let documents = config
            .retriever
            .documents
            .iter()
            .map(|d| RetrievedDocument {
                id: d.id.clone(),
                content: d.content.clone(),
                metadata: d.metadata.clone(),
            })
            .collect();
        Self::new(documents, config.effective_model())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn score(terms: &HashSet<String>, content: &str) -> usize {
        let words = tokenize(content);
        terms.iter().filter(|t| words.contains(*t)).count()
    }

    /// Concatenate contents in rank order until the token cap is reached.
    /// The document that crosses the cap is truncated, later ones dropped.
    fn merge_context(&self, documents: &[RetrievedDocument], max_tokens: usize) -> String {
        let mut context = String::new();
        let mut used = 0usize;

        for doc in documents {
            let piece = if context.is_empty() {
                doc.content.clone()
            } else {
                format!("{CONTEXT_SEPARATOR}{}", doc.content)
            };
            let cost = estimate_tokens(&piece, &self.model);
            if used + cost <= max_tokens {
                context.push_str(&piece);
                used += cost;
                continue;
            }
            let remaining = max_tokens.saturating_sub(used);
            if remaining > 0 {
                context.push_str(&truncate_to_tokens(&piece, remaining, &self.model));
            }
            break;
        }

        context
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_TERM_CHARS)
        .map(|w| w.to_lowercase())
        .collect()
}

#[async_trait]
impl Retriever for KeywordRetriever {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResult, RetrievalError> {
        let terms = tokenize(&request.query);

        let mut scored: Vec<(usize, &RetrievedDocument)> = self
            .documents
            .iter()
            .filter(|d| {
                request
                    .filter
                    .as_ref()
                    .is_none_or(|f| f.matches(&d.metadata))
            })
            .map(|d| (Self::score(&terms, &d.content), d))
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable: equal scores keep corpus order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let documents: Vec<RetrievedDocument> = scored
            .into_iter()
            .take(request.top_k)
            .map(|(_, d)| d.clone())
            .collect();

        let context = self.merge_context(&documents, request.max_context_tokens);

        debug!(
            matched = documents.len(),
            context_tokens = estimate_tokens(&context, &self.model),
            "Keyword retrieval complete"
        );

        Ok(RetrievalResult { documents, context })
    }
}
