//! `tutorly ask`: Run the RAG pipeline once from the command line.

use tutorly_agent::QueryResponse;
use tutorly_config::AppConfig;
use tutorly_core::query::QueryRequest;

pub async fn run(
    query: String,
    subject: Option<String>,
    grade: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let request = build_request(query, subject, grade);
    request.validate()?;

    let pipeline = tutorly_gateway::build_pipeline(&config)?;
    let response = pipeline.answer(&request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", render(&response));
    }

    Ok(())
}

fn build_request(query: String, subject: Option<String>, grade: Option<String>) -> QueryRequest {
    let mut request = QueryRequest::new(query.trim());
    if let Some(subject) = subject.filter(|s| !s.trim().is_empty()) {
        request = request.with_subject(subject);
    }
    if let Some(grade) = grade.filter(|g| !g.trim().is_empty()) {
        request = request.with_grade(grade);
    }
    request
}

fn render(response: &QueryResponse) -> String {
    let mut out = format!("{}\n", response.answer);
    if !response.sources.is_empty() {
        out.push_str("\nSources:\n");
        for source in &response.sources {
            out.push_str(&format!("  [{}] {}\n", source.id, source.content));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorly_agent::Source;

    #[test]
    fn blank_filters_are_dropped() {
        let request = build_request("  What is DNA?  ".into(), Some("  ".into()), Some("9th".into()));
        assert_eq!(request.query, "What is DNA?");
        assert!(request.subject.is_none());
        assert_eq!(request.grade.as_deref(), Some("9th"));
    }

    #[test]
    fn short_query_fails_validation() {
        let request = build_request("hi".into(), None, None);
        assert!(request.validate().is_err());
    }

    #[test]
    fn renders_sources() {
        let response = QueryResponse {
            answer: "Cells divide.".into(),
            sources: vec![Source {
                id: "bio-1".into(),
                content: "Mitosis...".into(),
                metadata: serde_json::Map::new(),
            }],
        };
        let text = render(&response);
        assert!(text.starts_with("Cells divide.\n"));
        assert!(text.contains("[bio-1] Mitosis..."));
    }
}
