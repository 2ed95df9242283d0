//! `tutorly config`: Configuration management commands.

use tutorly_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Provider:  {}", config.default_provider);
            println!("   Model:     {}", config.effective_model());
            println!(
                "   Gateway:   {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!("   Cache:     {}", config.cache.backend);
            println!("   Retriever: {}", config.retriever.backend);
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Non-fatal problems worth pointing out.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if !config.has_api_key() {
        warnings.push("No API key set (set TUTORLY_API_KEY or OPENAI_API_KEY)");
    }

    if config.retriever.backend == "keyword" && config.retriever.documents.is_empty() {
        warnings.push("Keyword retriever has no [[retriever.documents]]; answers will be ungrounded");
    }

    if config.rag.max_context_tokens >= config.rag.prompt_token_budget {
        warnings.push("rag.max_context_tokens >= rag.prompt_token_budget; context will be truncated");
    }

    if config.cache.backend == "none" {
        warnings.push("Response cache disabled (cache.backend = \"none\")");
    }

    warnings
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
