//! Error types for the tutorly domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own error variant.

use thiserror::Error;

/// The top-level error type for all tutorly operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Generator errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Retriever errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Cache store errors ---
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Retriever request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Retriever unreachable: {0}")]
    Network(String),

    #[error("Invalid retriever response: {0}")]
    InvalidResponse(String),

    #[error("Retriever not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    #[error("Cache storage error: {0}")]
    Storage(String),

    #[error("Cache payload could not be (de)serialized: {0}")]
    Serialization(String),
}
