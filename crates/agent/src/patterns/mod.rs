//! Request pipelines built on the context utilities.

pub mod rag;

pub use rag::{QueryResponse, RagPipeline, Source};

#[cfg(test)]
pub(crate) mod test_helpers;
