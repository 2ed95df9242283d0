//! # tutorly core
//!
//! Domain types, traits, and error definitions for the tutorly
//! retrieval-augmented answering pipeline. This crate has **no framework
//! dependencies**: it defines the seams (generator, retriever, cache store)
//! that the other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in
//! their respective crates, which keeps:
//! - backends swappable via configuration
//! - tests free to plug in scripted mocks
//! - the dependency graph pointing inward on core

pub mod cache;
pub mod error;
pub mod message;
pub mod provider;
pub mod query;
pub mod retriever;

// Re-export key types at crate root for ergonomics
pub use cache::CacheStore;
pub use error::{CacheError, Error, ProviderError, Result, RetrievalError};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat};
pub use query::{QueryRequest, ValidationErrors};
pub use retriever::{MetadataFilter, RetrievalRequest, RetrievalResult, RetrievedDocument, Retriever};
