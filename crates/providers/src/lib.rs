//! Generator and retriever clients for tutorly.
//!
//! Generators implement `tutorly_core::Provider`; the router selects one
//! based on configuration. The HTTP retriever implements
//! `tutorly_core::Retriever` against a remote retrieval service.

pub mod http_retriever;
pub mod openai_compat;
pub mod router;

pub use http_retriever::HttpRetriever;
pub use openai_compat::OpenAiCompatProvider;
pub use router::ProviderRouter;
