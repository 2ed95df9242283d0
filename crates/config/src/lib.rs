//! Configuration loading, validation, and management for tutorly.
//!
//! Loads configuration from `~/.tutorly/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.tutorly/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default answer generator provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Generation temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per answer when the request does not set one
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// "development" or "production"; production hides internal error details
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// RAG pipeline tuning
    #[serde(default)]
    pub rag: RagConfig,

    /// Document retriever configuration
    #[serde(default)]
    pub retriever: RetrieverConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Log output configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_environment() -> String {
    "development".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("environment", &self.environment)
            .field("gateway", &self.gateway)
            .field("cache", &self.cache)
            .field("rag", &self.rag)
            .field("retriever", &self.retriever)
            .field("providers", &self.providers)
            .field("logging", &self.logging)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Request body size limit
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Browser origins allowed to call the API (empty = no CORS headers)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8787
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// "memory" or "none"
    #[serde(default = "default_cache_backend")]
    pub backend: String,

    /// Lifetime of a cached answer
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Request headers allowed to vary the cache key
    #[serde(default = "default_vary_headers")]
    pub vary_headers: Vec<String>,
}

fn default_cache_backend() -> String {
    "memory".into()
}
fn default_cache_ttl() -> u64 {
    3600
}
fn default_vary_headers() -> Vec<String> {
    vec!["accept-language".into()]
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            ttl_secs: default_cache_ttl(),
            vary_headers: default_vary_headers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Documents requested from the retriever
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Token ceiling for the retriever's merged context
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Token ceiling for the final instruction sent to the generator
    #[serde(default = "default_prompt_token_budget")]
    pub prompt_token_budget: usize,

    /// Characters of each source shown in the response
    #[serde(default = "default_source_preview_chars")]
    pub source_preview_chars: usize,

    /// System instruction for the generator
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Answer returned when generation fails
    #[serde(default = "default_fallback_answer")]
    pub fallback_answer: String,
}

fn default_top_k() -> usize {
    3
}
fn default_max_context_tokens() -> usize {
    2000
}
fn default_prompt_token_budget() -> usize {
    3000
}
fn default_source_preview_chars() -> usize {
    200
}
fn default_system_prompt() -> String {
    "You are a patient, accurate tutor. Answer the student's question using the \
     provided context. If the context does not cover the question, say so and \
     answer from general knowledge."
        .into()
}
fn default_fallback_answer() -> String {
    "[Fallback answer] The answer service is temporarily unavailable. \
     Please review the sources below or try again shortly."
        .into()
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_context_tokens: default_max_context_tokens(),
            prompt_token_budget: default_prompt_token_budget(),
            source_preview_chars: default_source_preview_chars(),
            system_prompt: default_system_prompt(),
            fallback_answer: default_fallback_answer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// "http" (remote service) or "keyword" (in-process corpus)
    #[serde(default = "default_retriever_backend")]
    pub backend: String,

    /// Endpoint for the http backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Request timeout for the http backend
    #[serde(default = "default_retriever_timeout")]
    pub timeout_secs: u64,

    /// Corpus for the keyword backend
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<DocumentConfig>,
}

fn default_retriever_backend() -> String {
    "keyword".into()
}
fn default_retriever_timeout() -> u64 {
    30
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            backend: default_retriever_backend(),
            url: None,
            timeout_secs: default_retriever_timeout(),
            documents: Vec::new(),
        }
    }
}

/// A document served by the keyword retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.tutorly/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `TUTORLY_API_KEY`, then `OPENAI_API_KEY`
    /// - `TUTORLY_PROVIDER`, `TUTORLY_MODEL`
    /// - `TUTORLY_RETRIEVER_URL` (also selects the http retriever)
    /// - `TUTORLY_ENV`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = get("TUTORLY_API_KEY").or_else(|| get("OPENAI_API_KEY"));
        }
        if let Some(provider) = get("TUTORLY_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = get("TUTORLY_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = get("TUTORLY_RETRIEVER_URL") {
            self.retriever.backend = "http".into();
            self.retriever.url = Some(url);
        }
        if let Some(env) = get("TUTORLY_ENV") {
            self.environment = env;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tutorly")
    }

    /// Whether internal error details must be hidden from clients.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.default_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "default_max_tokens must be > 0".into(),
            ));
        }

        if self.gateway.max_body_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_body_bytes must be > 0".into(),
            ));
        }

        if !matches!(self.cache.backend.as_str(), "memory" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "cache.backend must be \"memory\" or \"none\", got \"{}\"",
                self.cache.backend
            )));
        }

        if self.cache.backend == "memory" && self.cache.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cache.ttl_secs must be > 0".into(),
            ));
        }

        if !matches!(self.retriever.backend.as_str(), "http" | "keyword") {
            return Err(ConfigError::ValidationError(format!(
                "retriever.backend must be \"http\" or \"keyword\", got \"{}\"",
                self.retriever.backend
            )));
        }

        if self.rag.top_k == 0 {
            return Err(ConfigError::ValidationError("rag.top_k must be > 0".into()));
        }

        if self.rag.prompt_token_budget == 0 {
            return Err(ConfigError::ValidationError(
                "rag.prompt_token_budget must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// The model sent to the generator: the default provider's own
    /// `default_model` when its table sets one, else the top-level one.
    pub fn effective_model(&self) -> &str {
        self.providers
            .get(&self.default_provider)
            .and_then(|p| p.default_model.as_deref())
            .unwrap_or(&self.default_model)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            environment: default_environment(),
            gateway: GatewayConfig::default(),
            cache: CacheConfig::default(),
            rag: RagConfig::default(),
            retriever: RetrieverConfig::default(),
            providers: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
