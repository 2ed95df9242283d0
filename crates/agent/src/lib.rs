//! Prompt construction and the retrieval-augmented answer pipeline.
//!
//! 1. **Retrieve** documents for a validated query
//! 2. **Pack** instruction, question and context under a token ceiling
//! 3. **Generate** the answer via the configured provider
//! 4. **Shape** the answer and source previews for the client

pub mod context;
pub mod patterns;
pub mod retrieval;

pub use context::{
    ModelProfile, TextSection, estimate_message_tokens, estimate_messages_tokens, estimate_tokens,
    optimize, truncate_to_tokens,
};
pub use patterns::{QueryResponse, RagPipeline, Source};
pub use retrieval::KeywordRetriever;
