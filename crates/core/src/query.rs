//! The query request accepted at the HTTP boundary.
//!
//! A [`QueryRequest`] is built once from the raw JSON body. Every violated
//! constraint is collected so the caller can report them together; an
//! invalid request never reaches the pipeline.

use crate::provider::ResponseFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Minimum query length, in characters, after trimming.
pub const MIN_QUERY_CHARS: usize = 3;

/// A validated query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default)]
    pub response_format: ResponseFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// All constraint violations found in one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<String>);

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

impl QueryRequest {
    /// A plain-text query with no filters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            subject: None,
            grade: None,
            response_format: ResponseFormat::Text,
            max_tokens: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_grade(mut self, grade: impl Into<String>) -> Self {
        self.grade = Some(grade.into());
        self
    }

    /// Check the constraints that apply to an already-typed request.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        check_query(&self.query, &mut errors);
        if self.max_tokens == Some(0) {
            errors.push("maxTokens must be a positive integer".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// Parse and validate a raw JSON body, collecting every violation.
    pub fn from_json(body: &Value) -> Result<Self, ValidationErrors> {
        let Some(object) = body.as_object() else {
            return Err(ValidationErrors(vec![
                "request body must be a JSON object".to_string(),
            ]));
        };

        let mut errors = Vec::new();

        let query = match object.get("query") {
            None | Some(Value::Null) => {
                errors.push("query is required".to_string());
                String::new()
            }
            Some(Value::String(q)) => {
                check_query(q, &mut errors);
                q.trim().to_string()
            }
            Some(_) => {
                errors.push("query must be a string".to_string());
                String::new()
            }
        };

        let subject = optional_string(object.get("subject"), "subject", &mut errors);
        let grade = optional_string(object.get("grade"), "grade", &mut errors);

        let response_format = match object.get("responseFormat") {
            None | Some(Value::Null) => ResponseFormat::Text,
            Some(Value::String(s)) => ResponseFormat::parse(s).unwrap_or_else(|| {
                errors.push("responseFormat must be one of: text, json".to_string());
                ResponseFormat::Text
            }),
            Some(_) => {
                errors.push("responseFormat must be one of: text, json".to_string());
                ResponseFormat::Text
            }
        };

        let max_tokens = match object.get("maxTokens") {
            None | Some(Value::Null) => None,
            Some(v) => match v.as_u64().filter(|n| *n > 0).and_then(|n| u32::try_from(n).ok()) {
                Some(n) => Some(n),
                None => {
                    errors.push("maxTokens must be a positive integer".to_string());
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(ValidationErrors(errors));
        }

        Ok(Self {
            query,
            subject,
            grade,
            response_format,
            max_tokens,
        })
    }
}

fn check_query(query: &str, errors: &mut Vec<String>) {
    if query.trim().chars().count() < MIN_QUERY_CHARS {
        errors.push(format!(
            "query must be at least {MIN_QUERY_CHARS} characters"
        ));
    }
}

/// Blank strings count as absent.
fn optional_string(value: Option<&Value>, field: &str, errors: &mut Vec<String>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(_) => {
            errors.push(format!("{field} must be a string"));
            None
        }
    }
}
