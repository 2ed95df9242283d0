//! Priority-based prompt packing.
//!
//! Sections are ordered by priority (highest first, ties keep their input
//! order) and concatenated while they fit. The first section that does not
//! fit is truncated to the remaining budget and packing stops there.

use crate::context::token::estimate_tokens;
use crate::context::truncate::truncate_to_tokens;

/// A piece of prompt text with a packing priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSection {
    pub text: String,
    pub priority: i32,
}

impl TextSection {
    pub fn new(text: impl Into<String>, priority: i32) -> Self {
        Self {
            text: text.into(),
            priority,
        }
    }
}

/// Pack `sections` into a single string whose estimate stays within
/// `max_tokens`. Sections are joined without separators.
pub fn optimize(sections: &[TextSection], max_tokens: usize, model: &str) -> String {
    let mut ordered: Vec<&TextSection> = sections.iter().collect();
    // Vec::sort_by is stable
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut out = String::new();
    let mut used = 0usize;

    for section in ordered {
        let cost = estimate_tokens(&section.text, model);
        if used + cost <= max_tokens {
            out.push_str(&section.text);
            used += cost;
            continue;
        }

        let remaining = max_tokens.saturating_sub(used);
        if remaining > 0 {
            out.push_str(&truncate_to_tokens(&section.text, remaining, model));
        }
        break;
    }

    out
}
