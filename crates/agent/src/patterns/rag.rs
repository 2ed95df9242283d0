//! RAG pipeline: retrieve, pack the prompt, generate, shape the answer.
//!
//! # Flow
//!
//! 1. Receive a validated [`QueryRequest`]
//! 2. Ask the retriever for documents and a merged context
//! 3. Pack instruction, question and context under the prompt budget
//! 4. Generate the answer
//! 5. Return the answer with truncated source previews
//!
//! Retrieval and generation failures are absorbed here. A failed retrieval
//! yields an ungrounded answer; a failed generation yields the configured
//! fallback text. [`RagPipeline::answer`] therefore never fails.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tutorly_config::RagConfig;
use tutorly_core::message::Message;
use tutorly_core::provider::{Provider, ProviderRequest, ResponseFormat};
use tutorly_core::query::QueryRequest;
use tutorly_core::retriever::{
    MetadataFilter, RetrievalRequest, RetrievalResult, RetrievedDocument, Retriever,
};

use crate::context::optimizer::{TextSection, optimize};

const INSTRUCTION_PRIORITY: i32 = 3;
const QUESTION_PRIORITY: i32 = 2;
const CONTEXT_PRIORITY: i32 = 1;

const PREVIEW_ELLIPSIS: &str = "...";

/// A source document as shown to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Body of a successful query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}

pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    default_max_tokens: u32,
    settings: RagConfig,
}

impl RagPipeline {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Provider>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            retriever,
            generator,
            model: model.into(),
            temperature: 0.3,
            default_max_tokens: 1000,
            settings: RagConfig::default(),
        }
    }

    /// Build with model, temperature, token defaults and `[rag]` settings
    /// taken from the application config.
    pub fn from_config(
        config: &tutorly_config::AppConfig,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Provider>,
    ) -> Self {
        Self::new(retriever, generator, config.effective_model())
            .with_temperature(config.default_temperature)
            .with_default_max_tokens(config.default_max_tokens)
            .with_settings(config.rag.clone())
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    pub fn with_settings(mut self, settings: RagConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Answer a validated query.
    pub async fn answer(&self, request: &QueryRequest) -> QueryResponse {
        info!(
            query_chars = request.query.chars().count(),
            subject = request.subject.as_deref().unwrap_or("-"),
            grade = request.grade.as_deref().unwrap_or("-"),
            "RAG: starting retrieval"
        );

        let retrieved = self.retrieve(request).await;
        let prompt = self.build_prompt(request, &retrieved.context);

        debug!(
            documents = retrieved.documents.len(),
            prompt_chars = prompt.chars().count(),
            "RAG: prompt built"
        );

        let answer = self.generate(request, prompt).await;

        QueryResponse {
            answer,
            sources: retrieved
                .documents
                .iter()
                .map(|d| self.to_source(d))
                .collect(),
        }
    }

    async fn retrieve(&self, request: &QueryRequest) -> RetrievalResult {
        let retrieval = RetrievalRequest {
            query: request.query.clone(),
            filter: MetadataFilter::from_parts(request.subject.as_deref(), request.grade.as_deref()),
            top_k: self.settings.top_k,
            max_context_tokens: self.settings.max_context_tokens,
        };

        match self.retriever.retrieve(retrieval).await {
            Ok(result) => result,
            Err(e) => {
                warn!(retriever = self.retriever.name(), error = %e, "Retrieval failed, continuing without context");
                RetrievalResult::default()
            }
        }
    }

    fn build_prompt(&self, request: &QueryRequest, context: &str) -> String {
        let mut instruction = String::from("Answer the student's question");
        match (&request.subject, &request.grade) {
            (Some(subject), Some(grade)) => {
                instruction.push_str(&format!(" for a {grade} grade {subject} class"))
            }
            (Some(subject), None) => instruction.push_str(&format!(" for a {subject} class")),
            (None, Some(grade)) => instruction.push_str(&format!(" for a {grade} grade student")),
            (None, None) => {}
        }
        instruction.push_str(". Use the context when it is relevant.");
        if request.response_format == ResponseFormat::Json {
            instruction.push_str(" Respond with a single JSON object.");
        }
        instruction.push_str("\n\n");

        let mut sections = vec![
            TextSection::new(instruction, INSTRUCTION_PRIORITY),
            TextSection::new(format!("Question: {}\n\n", request.query), QUESTION_PRIORITY),
        ];
        if !context.is_empty() {
            sections.push(TextSection::new(format!("Context:\n{context}"), CONTEXT_PRIORITY));
        }

        optimize(&sections, self.settings.prompt_token_budget, &self.model)
    }

    async fn generate(&self, request: &QueryRequest, prompt: String) -> String {
        let provider_request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(&self.settings.system_prompt),
                Message::user(prompt),
            ],
            temperature: self.temperature,
            max_tokens: Some(request.max_tokens.unwrap_or(self.default_max_tokens)),
            response_format: request.response_format,
        };

        match self.generator.complete(provider_request).await {
            Ok(response) => {
                info!(
                    answer_len = response.message.content.len(),
                    "RAG: response generated"
                );
                response.message.content
            }
            Err(e) => {
                warn!(generator = self.generator.name(), error = %e, "Generation failed, returning fallback answer");
                self.settings.fallback_answer.clone()
            }
        }
    }

    fn to_source(&self, document: &RetrievedDocument) -> Source {
        Source {
            id: document.id.clone(),
            content: preview(&document.content, self.settings.source_preview_chars),
            metadata: document.metadata.clone(),
        }
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => format!("{}{PREVIEW_ELLIPSIS}", &text[..byte]),
        None => text.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::token::estimate_tokens;
    use crate::patterns::test_helpers::*;

    fn photosynthesis_docs() -> Vec<RetrievedDocument> {
        vec![
            make_document(
                "bio-1",
                &"Photosynthesis converts light energy into chemical energy stored in glucose. "
                    .repeat(5),
                "Biology",
            ),
            make_document("bio-2", "Chlorophyll absorbs red and blue light.", "Biology"),
        ]
    }

    fn request() -> QueryRequest {
        QueryRequest::new("How does photosynthesis work?")
            .with_subject("Biology")
            .with_grade("9th")
    }

    #[tokio::test]
    async fn answers_with_sources() {
        let retriever = Arc::new(StaticRetriever::new(
            photosynthesis_docs(),
            "Photosynthesis converts light energy.",
        ));
        let provider = Arc::new(RecordingProvider::new("Plants turn light into sugar."));
        let pipeline = RagPipeline::new(retriever.clone(), provider.clone(), "gpt-4o-mini");

        let response = pipeline.answer(&request()).await;

        assert_eq!(response.answer, "Plants turn light into sugar.");
        assert_eq!(response.sources.len(), 2);
        for source in &response.sources {
            assert!(source.content.chars().count() <= 203);
        }
        assert!(response.sources[0].content.ends_with("..."));
        assert_eq!(response.sources[1].content, "Chlorophyll absorbs red and blue light.");
        assert_eq!(response.sources[0].metadata["subject"], "Biology");
        assert_eq!(retriever.call_count(), 1);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn forwards_filter_and_limits_to_retriever() {
        let retriever = Arc::new(StaticRetriever::new(vec![], ""));
        let provider = Arc::new(RecordingProvider::new("ok"));
        let pipeline = RagPipeline::new(retriever.clone(), provider, "gpt-4o-mini");

        pipeline.answer(&request()).await;

        let sent = retriever.last_request();
        let filter = sent.filter.unwrap();
        assert_eq!(filter.subject.as_deref(), Some("Biology"));
        assert_eq!(filter.grade.as_deref(), Some("9th"));
        assert_eq!(sent.top_k, 3);
        assert_eq!(sent.max_context_tokens, 2000);
    }

    #[tokio::test]
    async fn generator_request_shape() {
        let retriever = Arc::new(StaticRetriever::new(vec![], "Chlorophyll is green."));
        let provider = Arc::new(RecordingProvider::new("ok"));
        let pipeline = RagPipeline::new(retriever, provider.clone(), "gpt-4o-mini");

        let mut req = request();
        req.response_format = ResponseFormat::Json;
        pipeline.answer(&req).await;

        let sent = provider.last_request();
        assert_eq!(sent.messages.len(), 2);
        assert_eq!(sent.messages[0].content, RagConfig::default().system_prompt);
        let prompt = &sent.messages[1].content;
        assert!(prompt.contains("Question: How does photosynthesis work?"));
        assert!(prompt.contains("Context:\nChlorophyll is green."));
        assert!(prompt.contains("9th grade Biology"));
        assert_eq!(sent.max_tokens, Some(1000));
        assert_eq!(sent.response_format, ResponseFormat::Json);
        assert!((sent.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn from_config_uses_provider_model() {
        let mut config = tutorly_config::AppConfig::default();
        config.default_provider = "ollama".into();
        config.providers.insert(
            "ollama".into(),
            tutorly_config::ProviderConfig {
                api_key: None,
                api_url: None,
                default_model: Some("llama3".into()),
            },
        );
        let provider = Arc::new(RecordingProvider::new("ok"));
        let pipeline = RagPipeline::from_config(
            &config,
            Arc::new(StaticRetriever::new(vec![], "")),
            provider.clone(),
        );

        assert_eq!(pipeline.model(), "llama3");
        pipeline.answer(&request()).await;
        assert_eq!(provider.last_request().model, "llama3");
    }

    #[tokio::test]
    async fn request_max_tokens_overrides_default() {
        let retriever = Arc::new(StaticRetriever::new(vec![], ""));
        let provider = Arc::new(RecordingProvider::new("ok"));
        let pipeline = RagPipeline::new(retriever, provider.clone(), "gpt-4o-mini");

        let mut req = request();
        req.max_tokens = Some(250);
        pipeline.answer(&req).await;

        assert_eq!(provider.last_request().max_tokens, Some(250));
    }

    #[tokio::test]
    async fn prompt_respects_budget() {
        let huge_context = "Light reactions happen in the thylakoid. ".repeat(500);
        let retriever = Arc::new(StaticRetriever::new(vec![], &huge_context));
        let provider = Arc::new(RecordingProvider::new("ok"));
        let settings = RagConfig {
            prompt_token_budget: 100,
            ..RagConfig::default()
        };
        let pipeline =
            RagPipeline::new(retriever, provider.clone(), "gpt-4o-mini").with_settings(settings);

        pipeline.answer(&request()).await;

        let prompt = provider.last_request().messages[1].content.clone();
        assert!(estimate_tokens(&prompt, "gpt-4o-mini") <= 101);
        assert!(prompt.contains("Question:"));
    }

    #[tokio::test]
    async fn generator_failure_returns_fallback() {
        let retriever = Arc::new(StaticRetriever::new(photosynthesis_docs(), "context"));
        let pipeline = RagPipeline::new(retriever, Arc::new(FailingProvider), "gpt-4o-mini");

        let response = pipeline.answer(&request()).await;

        assert!(!response.answer.is_empty());
        assert_eq!(response.answer, RagConfig::default().fallback_answer);
        assert_eq!(response.sources.len(), 2);
    }

    #[tokio::test]
    async fn retrieval_failure_degrades_to_empty_context() {
        let retriever = Arc::new(StaticRetriever::failing());
        let provider = Arc::new(RecordingProvider::new("General answer."));
        let pipeline = RagPipeline::new(retriever, provider.clone(), "gpt-4o-mini");

        let response = pipeline.answer(&request()).await;

        assert_eq!(response.answer, "General answer.");
        assert!(response.sources.is_empty());
        assert!(!provider.last_request().messages[1].content.contains("Context:"));
    }

    #[tokio::test]
    async fn no_filter_without_subject_or_grade() {
        let retriever = Arc::new(StaticRetriever::new(vec![], ""));
        let provider = Arc::new(RecordingProvider::new("ok"));
        let pipeline = RagPipeline::new(retriever.clone(), provider, "gpt-4o-mini");

        pipeline.answer(&QueryRequest::new("What is a cell?")).await;

        assert!(retriever.last_request().filter.is_none());
    }

    #[test]
    fn preview_cuts_on_characters() {
        assert_eq!(preview("short", 200), "short");
        assert_eq!(preview(&"x".repeat(200), 200), "x".repeat(200));
        assert_eq!(preview(&"é".repeat(250), 200), "é".repeat(200) + "...");
    }

    #[test]
    fn response_serializes_to_wire_shape() {
        let response = QueryResponse {
            answer: "A".into(),
            sources: vec![Source {
                id: "d1".into(),
                content: "c".into(),
                metadata: serde_json::Map::new(),
            }],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["answer"], "A");
        assert_eq!(json["sources"][0]["id"], "d1");
    }
}
