//! Token estimation utilities.
//!
//! Uses a character-ratio heuristic per model family: a token is roughly
//! 4 characters of English text for GPT-style BPE vocabularies and a little
//! less for Claude. Exact tokenizer counts are not needed; the estimate is
//! only used to keep prompts under a ceiling.

use tutorly_core::message::Message;

/// Characters per token for models that are not in the table.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

/// Reply-priming cost paid once per conversation.
pub const CONVERSATION_BASE_OVERHEAD: usize = 3;

/// Role name, delimiters, and formatting markers around each message.
pub const MESSAGE_OVERHEAD: usize = 4;

/// A model's characters-per-token ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelProfile {
    pub name: &'static str,
    pub chars_per_token: f64,
}

const PROFILES: &[ModelProfile] = &[
    ModelProfile { name: "gpt-4o-mini", chars_per_token: 4.0 },
    ModelProfile { name: "gpt-4o", chars_per_token: 4.0 },
    ModelProfile { name: "gpt-4", chars_per_token: 4.0 },
    ModelProfile { name: "gpt-3.5-turbo", chars_per_token: 4.0 },
    ModelProfile { name: "claude", chars_per_token: 3.5 },
    ModelProfile { name: "llama", chars_per_token: 3.8 },
    ModelProfile { name: "mistral", chars_per_token: 3.8 },
];

impl ModelProfile {
    pub const DEFAULT: ModelProfile = ModelProfile {
        name: "default",
        chars_per_token: DEFAULT_CHARS_PER_TOKEN,
    };

    /// Resolve a model name to its profile.
    ///
    /// A `vendor/` prefix is ignored. Exact names win, then the longest
    /// table entry the name starts with; anything else gets the default.
    pub fn lookup(model: &str) -> ModelProfile {
        let bare = model.rsplit('/').next().unwrap_or(model).to_ascii_lowercase();

        if let Some(profile) = PROFILES.iter().find(|p| p.name == bare) {
            return *profile;
        }

        PROFILES
            .iter()
            .filter(|p| bare.starts_with(p.name))
            .max_by_key(|p| p.name.len())
            .copied()
            .unwrap_or(Self::DEFAULT)
    }
}

/// Estimate the token count for a string: `ceil(chars / chars_per_token)`.
pub fn estimate_tokens(text: &str, model: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let ratio = ModelProfile::lookup(model).chars_per_token;
    (text.chars().count() as f64 / ratio).ceil() as usize
}

/// Estimate tokens for a single message including framing overhead.
pub fn estimate_message_tokens(message: &Message, model: &str) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(&message.content, model)
}

/// Estimate tokens for an ordered message list.
///
/// An empty list still costs the reply-priming overhead.
pub fn estimate_messages_tokens(messages: &[Message], model: &str) -> usize {
    CONVERSATION_BASE_OVERHEAD
        + messages
            .iter()
            .map(|m| estimate_message_tokens(m, model))
            .sum::<usize>()
}
